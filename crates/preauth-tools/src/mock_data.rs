//! Simulated member, claims, and request data.
//!
//! All data in this module is hardcoded and fictional. Claim service dates
//! are stored as "days before the anchor date" so a lookback window always
//! finds the same history no matter when the demo runs.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Days, NaiveDate, NaiveDateTime, Utc};

use preauth_contracts::{
    error::{PreauthError, PreauthResult},
    request::{Priority, Request, RequestStatus},
};

use crate::reference::{ClaimRecord, MemberRecord, ReferenceData};

// ── Members ───────────────────────────────────────────────────────────────────

// (id, first, last, dob, gender, phone, email, plan type, plan id, group,
//  effective, termination, coverage level, copay primary, copay specialist,
//  deductible, deductible met, max OOP, OOP met, active, PCP, PCP NPI)
type MemberRow = (
    &'static str, &'static str, &'static str, &'static str, &'static str,
    &'static str, &'static str, &'static str, &'static str, &'static str,
    &'static str, Option<&'static str>, &'static str, f64, f64,
    f64, f64, f64, f64, bool, &'static str, &'static str,
);

#[rustfmt::skip]
const MEMBERS: [MemberRow; 16] = [
    ("MEM-100001", "John", "Doe", "1975-03-15", "M", "860-555-0101", "john.doe@email.com", "Gold Plus HMO", "PLN-GOLD-001", "GRP-5001", "2025-01-01", None, "Family", 25.0, 50.0, 3000.0, 1875.0, 8000.0, 3200.0, true, "Dr. Robert Chen", "1234567001"),
    ("MEM-100002", "Jane", "Smith", "1982-07-22", "F", "617-555-0202", "jane.smith@email.com", "Silver PPO", "PLN-SILV-002", "GRP-5002", "2025-01-01", None, "Individual", 35.0, 65.0, 4000.0, 2100.0, 10000.0, 4500.0, true, "Dr. Linda Park", "1234567002"),
    ("MEM-100003", "Robert", "Johnson", "1990-11-05", "M", "203-555-0303", "r.johnson@email.com", "Bronze HMO", "PLN-BRNZ-003", "GRP-5003", "2025-01-01", None, "Individual", 40.0, 75.0, 5000.0, 800.0, 12000.0, 1200.0, true, "Dr. James Wright", "1234567003"),
    ("MEM-100004", "Maria", "Garcia", "1968-04-10", "F", "413-555-0404", "m.garcia@email.com", "Gold Plus HMO", "PLN-GOLD-001", "GRP-5001", "2024-06-01", None, "Family", 25.0, 50.0, 3000.0, 2950.0, 8000.0, 5600.0, true, "Dr. Anita Patel", "1234567004"),
    ("MEM-100005", "James", "Wilson", "1955-09-28", "M", "401-555-0505", "j.wilson@email.com", "Platinum PPO", "PLN-PLAT-004", "GRP-5004", "2024-01-01", None, "Family", 15.0, 30.0, 1500.0, 1500.0, 5000.0, 3800.0, true, "Dr. Michael Torres", "1234567005"),
    ("MEM-100006", "Sarah", "Davis", "1978-12-03", "F", "203-555-0606", "s.davis@email.com", "Gold Plus HMO", "PLN-GOLD-001", "GRP-5001", "2025-01-01", None, "Individual", 25.0, 50.0, 3000.0, 1200.0, 8000.0, 2100.0, true, "Dr. Karen Liu", "1234567006"),
    ("MEM-100007", "Michael", "Brown", "1965-06-17", "M", "508-555-0707", "m.brown@email.com", "Silver PPO", "PLN-SILV-002", "GRP-5002", "2025-01-01", None, "Family", 35.0, 65.0, 4000.0, 3800.0, 10000.0, 7200.0, true, "Dr. Steven Grant", "1234567007"),
    ("MEM-100008", "Emily", "Taylor", "1988-01-25", "F", "203-555-0808", "e.taylor@email.com", "Bronze HMO", "PLN-BRNZ-003", "GRP-5003", "2025-01-01", None, "Individual", 40.0, 75.0, 5000.0, 600.0, 12000.0, 900.0, true, "Dr. Nancy Kim", "1234567008"),
    ("MEM-100009", "David", "Anderson", "1972-08-14", "M", "203-555-0909", "d.anderson@email.com", "Gold Plus HMO", "PLN-GOLD-001", "GRP-5001", "2025-01-01", None, "Family", 25.0, 50.0, 3000.0, 2400.0, 8000.0, 4100.0, true, "Dr. Paul Reeves", "1234567009"),
    ("MEM-100010", "Lisa", "Martinez", "1960-05-20", "F", "860-555-1010", "l.martinez@email.com", "Platinum PPO", "PLN-PLAT-004", "GRP-5004", "2024-01-01", None, "Individual", 15.0, 30.0, 1500.0, 1500.0, 5000.0, 4200.0, true, "Dr. Grace Huang", "1234567010"),
    ("MEM-100011", "Thomas", "White", "1985-10-09", "M", "203-555-1111", "t.white@email.com", "Silver PPO", "PLN-SILV-002", "GRP-5002", "2025-01-01", None, "Individual", 35.0, 65.0, 4000.0, 1600.0, 10000.0, 2800.0, true, "Dr. Mark Evans", "1234567011"),
    ("MEM-100012", "Jennifer", "Lee", "1976-02-28", "F", "203-555-1212", "j.lee@email.com", "Gold Plus HMO", "PLN-GOLD-001", "GRP-5001", "2025-01-01", None, "Family", 25.0, 50.0, 3000.0, 2700.0, 8000.0, 4800.0, true, "Dr. Susan Cho", "1234567012"),
    ("MEM-100013", "Christopher", "Clark", "1958-11-12", "M", "203-555-1313", "c.clark@email.com", "Bronze HMO", "PLN-BRNZ-003", "GRP-5003", "2024-06-01", None, "Individual", 40.0, 75.0, 5000.0, 4200.0, 12000.0, 6500.0, true, "Dr. Richard Gomez", "1234567013"),
    ("MEM-100014", "Amanda", "Harris", "1970-07-04", "F", "203-555-1414", "a.harris@email.com", "Platinum PPO", "PLN-PLAT-004", "GRP-5004", "2024-01-01", None, "Family", 15.0, 30.0, 1500.0, 1500.0, 5000.0, 4600.0, true, "Dr. Helen Wu", "1234567014"),
    ("MEM-100015", "Daniel", "Moore", "1992-03-30", "M", "203-555-1515", "d.moore@email.com", "Silver PPO", "PLN-SILV-002", "GRP-5002", "2025-01-01", None, "Individual", 35.0, 65.0, 4000.0, 500.0, 10000.0, 750.0, true, "Dr. Brian Foster", "1234567015"),
    ("MEM-100016", "Patricia", "Young", "1963-01-19", "F", "860-555-1616", "p.young@email.com", "Silver PPO", "PLN-SILV-002", "GRP-5002", "2023-01-01", Some("2025-12-31"), "Individual", 35.0, 65.0, 4000.0, 4000.0, 10000.0, 3100.0, false, "Dr. Linda Park", "1234567002"),
];

// ── Claims ────────────────────────────────────────────────────────────────────

// (member, days before anchor, provider, facility, CPT, description, ICD-10
//  codes, billed, paid, patient responsibility, status, denial reason,
//  service type, auth number)
type ClaimRow = (
    &'static str, u64, &'static str, &'static str, &'static str, &'static str,
    &'static [&'static str], f64, f64, f64, &'static str, Option<&'static str>,
    &'static str, Option<&'static str>,
);

#[rustfmt::skip]
const CLAIMS: [ClaimRow; 78] = [
    // John Doe, cardiac history
    ("MEM-100001", 180, "Dr. Robert Chen", "Hartford Cardiology Associates", "99213", "Office visit - established patient", &["I50.9", "E11.9"], 185.0, 132.0, 33.0, "paid", None, "outpatient", None),
    ("MEM-100001", 150, "Dr. Robert Chen", "Hartford Cardiology Associates", "93306", "Echocardiogram complete", &["I50.9"], 850.0, 624.0, 156.0, "paid", None, "outpatient", Some("AUTH-001")),
    ("MEM-100001", 120, "Hartford Hospital Lab", "Hartford Hospital", "80053", "Comprehensive metabolic panel", &["E11.9"], 245.0, 176.0, 44.0, "paid", None, "outpatient", None),
    ("MEM-100001", 90, "Dr. Robert Chen", "Hartford Cardiology Associates", "93000", "Electrocardiogram routine", &["I50.9", "I10"], 125.0, 88.0, 22.0, "paid", None, "outpatient", Some("AUTH-002")),
    ("MEM-100001", 45, "Dr. Robert Chen", "Hartford Cardiology Associates", "99214", "Office visit - detailed", &["I50.9", "E11.9"], 250.0, 180.0, 45.0, "paid", None, "outpatient", None),
    // Jane Smith, neurology
    ("MEM-100002", 200, "Dr. Linda Park", "Boston Neurology Center", "99213", "Office visit - established", &["G43.909"], 185.0, 108.5, 46.5, "paid", None, "outpatient", None),
    ("MEM-100002", 160, "Boston Medical ER", "Boston Medical Center", "99283", "ER visit - moderate", &["G43.909", "R51.9"], 650.0, 406.0, 174.0, "paid", None, "outpatient", None),
    ("MEM-100002", 120, "Dr. Linda Park", "Boston Neurology Center", "70450", "CT Head without contrast", &["R51.9"], 520.0, 336.0, 144.0, "paid", None, "outpatient", Some("AUTH-003")),
    ("MEM-100002", 60, "Dr. Linda Park", "Boston Neurology Center", "99214", "Office visit - detailed", &["G43.909"], 250.0, 147.0, 63.0, "paid", None, "outpatient", None),
    ("MEM-100002", 30, "Walgreens Pharmacy", "N/A", "99070", "Sumatriptan prescription", &["G43.909"], 85.0, 59.5, 25.5, "paid", None, "professional", None),
    // Robert Johnson, back pain
    ("MEM-100003", 240, "Dr. James Wright", "New Haven Primary Care", "99213", "Office visit", &["M54.5"], 185.0, 116.0, 29.0, "paid", None, "outpatient", None),
    ("MEM-100003", 210, "CT Imaging Center", "CT Imaging Center", "72100", "Lumbar spine X-ray 2 views", &["M54.5"], 340.0, 240.0, 60.0, "paid", None, "outpatient", None),
    ("MEM-100003", 180, "Dr. James Wright", "New Haven Primary Care", "99214", "Office visit - pain management", &["M54.5", "M79.3"], 250.0, 160.0, 40.0, "paid", None, "outpatient", None),
    ("MEM-100003", 120, "New Haven Chiro", "New Haven Chiropractic", "98940", "Chiropractic manipulation", &["M54.5"], 85.0, 56.0, 14.0, "paid", None, "outpatient", None),
    ("MEM-100003", 90, "New Haven Chiro", "New Haven Chiropractic", "98940", "Chiropractic manipulation", &["M54.5"], 85.0, 56.0, 14.0, "paid", None, "outpatient", None),
    // Maria Garcia, knee osteoarthritis
    ("MEM-100004", 330, "Dr. Anita Patel", "Springfield Medical Group", "99213", "Office visit", &["M17.11"], 185.0, 132.0, 33.0, "paid", None, "outpatient", None),
    ("MEM-100004", 300, "Springfield Ortho", "Springfield Orthopedic Center", "73565", "Knee X-ray weight bearing", &["M17.11"], 280.0, 200.0, 50.0, "paid", None, "outpatient", None),
    ("MEM-100004", 240, "Springfield PT", "Springfield Physical Therapy", "97110", "PT therapeutic exercise", &["M17.11"], 175.0, 124.0, 31.0, "paid", None, "outpatient", Some("AUTH-004")),
    ("MEM-100004", 180, "Springfield Ortho", "Springfield Orthopedic Center", "20610", "Knee injection corticosteroid", &["M17.11"], 320.0, 232.0, 58.0, "paid", None, "outpatient", None),
    ("MEM-100004", 120, "Springfield Ortho", "Springfield Orthopedic Center", "99214", "Orthopedic follow-up", &["M17.11", "M17.12"], 250.0, 180.0, 45.0, "paid", None, "outpatient", None),
    // James Wilson, coronary artery disease
    ("MEM-100005", 300, "Dr. Michael Torres", "Providence Heart Center", "99214", "Office visit - cardiology", &["I25.10"], 250.0, 204.0, 36.0, "paid", None, "outpatient", None),
    ("MEM-100005", 240, "Providence Heart Center", "Providence Heart Center", "93015", "Treadmill stress test", &["I25.10", "R07.9"], 450.0, 365.5, 64.5, "paid", None, "outpatient", None),
    ("MEM-100005", 180, "Providence Heart Center", "Providence Heart Center", "78452", "Nuclear cardiac imaging", &["I25.10"], 1200.0, 977.5, 172.5, "paid", None, "outpatient", Some("AUTH-005")),
    ("MEM-100005", 120, "Dr. Michael Torres", "Providence Heart Center", "93000", "ECG routine", &["I25.10", "I10"], 125.0, 102.0, 18.0, "paid", None, "outpatient", None),
    ("MEM-100005", 60, "Dr. Michael Torres", "Providence Heart Center", "99215", "Office visit - comprehensive", &["I25.10", "I20.0"], 375.0, 306.0, 54.0, "paid", None, "outpatient", None),
    // Sarah Davis, colonoscopy workup
    ("MEM-100006", 180, "Dr. Karen Liu", "Stamford GI Associates", "99213", "Office visit", &["K63.5"], 185.0, 132.0, 33.0, "paid", None, "outpatient", None),
    ("MEM-100006", 150, "Stamford Lab", "Stamford Hospital Lab", "82270", "Fecal occult blood test", &["Z12.11"], 35.0, 24.0, 6.0, "paid", None, "outpatient", None),
    ("MEM-100006", 120, "Dr. Karen Liu", "Stamford GI Associates", "99214", "GI consultation", &["K63.5", "Z12.11"], 250.0, 180.0, 45.0, "paid", None, "outpatient", None),
    ("MEM-100006", 90, "Stamford Hospital", "Stamford Hospital", "80053", "Pre-procedure labs", &["K63.5"], 245.0, 176.0, 44.0, "paid", None, "outpatient", None),
    ("MEM-100006", 60, "Dr. Karen Liu", "Stamford GI Associates", "99213", "Follow-up visit", &["K63.5"], 185.0, 132.0, 33.0, "paid", None, "outpatient", None),
    // Michael Brown, lumbar spine
    ("MEM-100007", 360, "Dr. Steven Grant", "Worcester Spine Center", "99214", "Office visit - spine", &["M43.16", "M54.5"], 250.0, 147.0, 63.0, "paid", None, "outpatient", None),
    ("MEM-100007", 300, "Worcester Imaging", "Worcester MRI Center", "72148", "MRI lumbar spine", &["M43.16"], 1400.0, 840.0, 360.0, "paid", None, "outpatient", Some("AUTH-006")),
    ("MEM-100007", 240, "Worcester Spine Center", "Worcester Spine Center", "62322", "Epidural injection lumbar", &["M43.16", "M54.5"], 890.0, 546.0, 234.0, "paid", None, "outpatient", None),
    ("MEM-100007", 180, "Worcester PT", "Worcester Physical Therapy", "97110", "PT therapeutic exercise", &["M54.5"], 175.0, 105.0, 45.0, "paid", None, "outpatient", None),
    ("MEM-100007", 90, "Worcester Spine Center", "Worcester Spine Center", "62322", "Epidural injection repeat", &["M43.16"], 890.0, 546.0, 234.0, "denied", Some("Less than 6 months conservative treatment documented"), "outpatient", None),
    // Emily Taylor, abdominal pain
    ("MEM-100008", 150, "Dr. Nancy Kim", "Bridgeport Medical Associates", "99213", "Office visit", &["R10.9"], 185.0, 116.0, 29.0, "paid", None, "outpatient", None),
    ("MEM-100008", 120, "Bridgeport Hospital Lab", "Bridgeport Hospital", "80053", "Comprehensive metabolic panel", &["R10.9"], 245.0, 176.0, 44.0, "paid", None, "outpatient", None),
    ("MEM-100008", 90, "Bridgeport Hospital Lab", "Bridgeport Hospital", "85025", "CBC with differential", &["R10.9"], 65.0, 44.0, 11.0, "paid", None, "outpatient", None),
    ("MEM-100008", 60, "Bridgeport ER", "Bridgeport Hospital ER", "99283", "ER visit - moderate", &["R10.9", "K80.20"], 650.0, 460.0, 115.0, "paid", None, "outpatient", None),
    ("MEM-100008", 30, "Bridgeport Hospital", "Bridgeport Hospital", "76700", "Abdominal ultrasound", &["K80.20"], 420.0, 304.0, 76.0, "paid", None, "outpatient", None),
    // David Anderson, rotator cuff
    ("MEM-100009", 240, "Dr. Paul Reeves", "Waterbury Ortho Center", "99213", "Office visit", &["M75.120"], 185.0, 132.0, 33.0, "paid", None, "outpatient", None),
    ("MEM-100009", 200, "Waterbury Imaging", "Waterbury MRI Center", "73221", "MRI shoulder without contrast", &["M75.120"], 950.0, 696.0, 174.0, "paid", None, "outpatient", Some("AUTH-007")),
    ("MEM-100009", 150, "Waterbury PT", "Waterbury Physical Therapy", "97110", "PT therapeutic exercise", &["M75.120"], 175.0, 124.0, 31.0, "paid", None, "outpatient", None),
    ("MEM-100009", 120, "Waterbury Ortho Center", "Waterbury Ortho Center", "20610", "Shoulder injection corticosteroid", &["M75.120"], 320.0, 232.0, 58.0, "paid", None, "outpatient", None),
    ("MEM-100009", 60, "Dr. Paul Reeves", "Waterbury Ortho Center", "99214", "Orthopedic follow-up", &["M75.120", "M75.100"], 250.0, 180.0, 45.0, "paid", None, "outpatient", None),
    // Lisa Martinez, oncology
    ("MEM-100010", 300, "Dr. Grace Huang", "CT Oncology Center", "99205", "New patient comprehensive", &["C50.911"], 450.0, 365.5, 64.5, "paid", None, "outpatient", None),
    ("MEM-100010", 270, "CT Oncology Center", "CT Oncology Center", "88305", "Pathology surgical biopsy", &["C50.911"], 380.0, 306.0, 54.0, "paid", None, "outpatient", None),
    ("MEM-100010", 240, "CT Oncology Center", "CT Oncology Center", "77063", "Breast MRI screening", &["C50.911"], 850.0, 688.5, 121.5, "paid", None, "outpatient", Some("AUTH-008")),
    ("MEM-100010", 180, "CT Oncology Center", "CT Oncology Center", "96413", "Chemo admin IV first hour", &["C50.911"], 2400.0, 1955.0, 345.0, "paid", None, "outpatient", Some("AUTH-009")),
    ("MEM-100010", 150, "CT Oncology Center", "CT Oncology Center", "96413", "Chemo admin cycle 2", &["C50.911"], 2400.0, 1955.0, 345.0, "paid", None, "outpatient", Some("AUTH-009")),
    // Thomas White, sleep apnea
    ("MEM-100011", 180, "Dr. Mark Evans", "Danbury Sleep Center", "99213", "Office visit", &["G47.33"], 185.0, 108.5, 46.5, "paid", None, "outpatient", None),
    ("MEM-100011", 150, "Danbury Sleep Center", "Danbury Sleep Center", "99214", "Sleep medicine consult", &["G47.33", "R06.83"], 250.0, 147.0, 63.0, "paid", None, "outpatient", None),
    ("MEM-100011", 120, "Danbury Sleep Center", "Danbury Sleep Center", "95800", "Home sleep test", &["G47.33"], 480.0, 294.0, 126.0, "denied", Some("Incomplete study - insufficient data"), "outpatient", None),
    ("MEM-100011", 90, "Dr. Mark Evans", "Danbury Sleep Center", "99213", "Follow-up office visit", &["G47.33"], 185.0, 108.5, 46.5, "paid", None, "outpatient", None),
    ("MEM-100011", 45, "Danbury Pharmacy", "N/A", "99070", "Modafinil prescription", &["G47.33"], 120.0, 84.0, 36.0, "paid", None, "professional", None),
    // Jennifer Lee, breast imaging
    ("MEM-100012", 180, "Dr. Susan Cho", "Norwalk Breast Center", "77067", "Screening mammogram bilateral", &["Z12.31"], 320.0, 232.0, 58.0, "paid", None, "outpatient", None),
    ("MEM-100012", 150, "Norwalk Breast Center", "Norwalk Breast Center", "77066", "Diagnostic mammogram bilateral", &["R92.1", "N63.0"], 420.0, 304.0, 76.0, "paid", None, "outpatient", None),
    ("MEM-100012", 120, "Norwalk Breast Center", "Norwalk Breast Center", "76642", "Breast ultrasound", &["N63.0"], 350.0, 248.0, 62.0, "paid", None, "outpatient", None),
    ("MEM-100012", 90, "Dr. Susan Cho", "Norwalk Breast Center", "99214", "Clinical breast exam follow-up", &["N63.0", "R92.1"], 250.0, 180.0, 45.0, "paid", None, "outpatient", None),
    ("MEM-100012", 60, "Norwalk Breast Center", "Norwalk Breast Center", "99213", "Pre-biopsy consultation", &["N63.0"], 185.0, 132.0, 33.0, "paid", None, "outpatient", None),
    // Christopher Clark, CPAP
    ("MEM-100013", 240, "Dr. Richard Gomez", "Meriden Medical Associates", "99213", "Office visit", &["G47.33", "E66.01"], 185.0, 116.0, 29.0, "paid", None, "outpatient", None),
    ("MEM-100013", 200, "Meriden Sleep Lab", "Meriden Sleep Lab", "95810", "Polysomnography diagnostic", &["G47.33"], 1800.0, 1280.0, 320.0, "paid", None, "outpatient", Some("AUTH-010")),
    ("MEM-100013", 150, "Dr. Richard Gomez", "Meriden Medical Associates", "99214", "Sleep study results review", &["G47.33"], 250.0, 160.0, 40.0, "paid", None, "outpatient", None),
    ("MEM-100013", 120, "Meriden DME", "Meriden DME Supply", "E0601", "CPAP device trial", &["G47.33"], 450.0, 320.0, 80.0, "denied", Some("Prior auth required for DME equipment"), "professional", None),
    ("MEM-100013", 60, "Dr. Richard Gomez", "Meriden Medical Associates", "99213", "CPAP follow-up visit", &["G47.33"], 185.0, 116.0, 29.0, "paid", None, "outpatient", None),
    // Amanda Harris, coronary stent
    ("MEM-100014", 330, "Dr. Helen Wu", "Milford Cardiology", "99214", "Cardiology consultation", &["I25.10", "I10"], 250.0, 204.0, 36.0, "paid", None, "outpatient", None),
    ("MEM-100014", 300, "Milford Cardiology", "Milford Cardiology Center", "93015", "Treadmill stress test", &["I25.10"], 450.0, 365.5, 64.5, "paid", None, "outpatient", None),
    ("MEM-100014", 240, "Milford Cardiology", "Milford Cardiology Center", "78452", "Myocardial perfusion imaging", &["I25.10"], 1200.0, 977.5, 172.5, "paid", None, "outpatient", Some("AUTH-011")),
    ("MEM-100014", 180, "Milford Hospital", "Milford Hospital", "93458", "Cardiac catheterization", &["I25.10", "I25.110"], 3800.0, 3060.0, 540.0, "paid", None, "inpatient", Some("AUTH-012")),
    ("MEM-100014", 90, "Dr. Helen Wu", "Milford Cardiology", "99215", "Comprehensive follow-up", &["I25.10", "I25.110"], 375.0, 306.0, 54.0, "paid", None, "outpatient", None),
    // Daniel Moore, stroke rehabilitation
    ("MEM-100015", 120, "Shelton Hospital ER", "Shelton Hospital", "99285", "ER visit - critical", &["I63.9"], 1200.0, 735.0, 315.0, "paid", None, "inpatient", None),
    ("MEM-100015", 110, "Shelton Hospital", "Shelton Hospital", "99223", "Hospital admission", &["I63.9", "G81.90"], 580.0, 357.0, 153.0, "paid", None, "inpatient", None),
    ("MEM-100015", 100, "Shelton Hospital", "Shelton Hospital", "70553", "MRI Brain with contrast", &["I63.9"], 1800.0, 1120.0, 480.0, "paid", None, "inpatient", Some("AUTH-013")),
    ("MEM-100015", 90, "Shelton Rehab", "Shelton Rehabilitation Center", "97530", "Therapeutic activities", &["I63.9", "G81.90"], 200.0, 122.5, 52.5, "paid", None, "outpatient", Some("AUTH-014")),
    ("MEM-100015", 60, "Dr. Brian Foster", "Shelton Neurology", "99214", "Neurology follow-up", &["I63.9"], 250.0, 147.0, 63.0, "paid", None, "outpatient", None),
    // Patricia Young, coverage lapsed
    ("MEM-100016", 500, "Dr. Linda Park", "Boston Neurology Center", "99213", "Office visit", &["M17.12"], 185.0, 108.5, 46.5, "paid", None, "outpatient", None),
    ("MEM-100016", 200, "Springfield Ortho", "Springfield Orthopedic Center", "73565", "Knee X-ray weight bearing", &["M17.12"], 280.0, 0.0, 280.0, "denied", Some("Coverage terminated"), "outpatient", None),
    ("MEM-100016", 40, "Springfield Ortho", "Springfield Orthopedic Center", "99214", "Orthopedic consultation", &["M17.12"], 250.0, 0.0, 250.0, "denied", Some("Coverage terminated"), "outpatient", None),
];

// ── Requests ──────────────────────────────────────────────────────────────────

// (id, patient, dob, member, provider, NPI, procedure code, procedure name,
//  diagnoses, submitted, status, priority, assigned to)
type RequestRow = (
    &'static str, &'static str, &'static str, &'static str, &'static str,
    &'static str, &'static str, &'static str, &'static [&'static str],
    &'static str, RequestStatus, Priority, Option<&'static str>,
);

#[rustfmt::skip]
const REQUESTS: [RequestRow; 16] = [
    ("PA-2026-0413", "Patricia Young", "1963-01-19", "MEM-100016", "Springfield Orthopedic Center", "1234567104", "CPT-27447", "Total Knee Arthroplasty - Left", &["M17.12"], "2026-02-04 11:40:00", RequestStatus::Pending, Priority::Medium, None),
    ("PA-2026-0412", "John Doe", "1975-03-15", "MEM-100001", "St. Mary's Hospital", "1234567001", "CPT-93000", "Electrocardiogram - 12 Lead", &["I50.9", "E11.9"], "2026-02-04 10:23:00", RequestStatus::Processing, Priority::High, Some("Dr. Sarah Johnson")),
    ("PA-2026-0411", "Jane Smith", "1982-07-22", "MEM-100002", "City Medical Center", "0987654321", "CPT-70553", "MRI Brain without and with Contrast", &["G43.909", "R51.9"], "2026-02-04 09:15:00", RequestStatus::Pending, Priority::High, None),
    ("PA-2026-0410", "Robert Johnson", "1990-11-05", "MEM-100003", "Valley Healthcare", "5678901234", "CPT-97110", "Physical Therapy - Therapeutic Exercise", &["M54.5", "M79.3"], "2026-02-03 14:30:00", RequestStatus::Approved, Priority::Medium, None),
    ("PA-2026-0409", "Maria Garcia", "1968-04-10", "MEM-100004", "Springfield Orthopedic Center", "1234567104", "CPT-27447", "Total Knee Arthroplasty - Right", &["M17.11"], "2026-02-03 11:00:00", RequestStatus::Approved, Priority::High, None),
    ("PA-2026-0408", "James Wilson", "1955-09-28", "MEM-100005", "Providence Heart Center", "1234567105", "CPT-93458", "Cardiac Catheterization - Left Heart", &["I25.10", "I20.0", "R07.9"], "2026-02-02 16:45:00", RequestStatus::Review, Priority::High, Some("Dr. Sarah Johnson")),
    ("PA-2026-0407", "Sarah Davis", "1978-12-03", "MEM-100006", "Stamford GI Associates", "1234567006", "CPT-45380", "Screening Colonoscopy with Polypectomy", &["K63.5", "Z12.11"], "2026-02-02 13:20:00", RequestStatus::Approved, Priority::Medium, None),
    ("PA-2026-0406", "Michael Brown", "1965-06-17", "MEM-100007", "Worcester Spine Center", "1234567007", "CPT-22612", "Lumbar Spinal Fusion L4-L5", &["M43.16", "M51.16"], "2026-02-02 09:00:00", RequestStatus::Denied, Priority::High, None),
    ("PA-2026-0405", "Emily Taylor", "1988-01-25", "MEM-100008", "Bridgeport Hospital", "1234567108", "CPT-74178", "CT Abdomen and Pelvis with Contrast", &["R10.9", "K80.20"], "2026-02-01 15:30:00", RequestStatus::Approved, Priority::Medium, None),
    ("PA-2026-0404", "David Anderson", "1972-08-14", "MEM-100009", "Waterbury Orthopedic Center", "1234567009", "CPT-29827", "Shoulder Arthroscopy - Rotator Cuff Repair", &["M75.120", "M75.100"], "2026-02-01 11:15:00", RequestStatus::Processing, Priority::Medium, Some("Nurse Emily Chen")),
    ("PA-2026-0403", "Lisa Martinez", "1960-05-20", "MEM-100010", "CT Oncology Center", "1234567110", "CPT-96413", "Chemotherapy Administration - IV Infusion", &["C50.911"], "2026-01-31 10:00:00", RequestStatus::Approved, Priority::High, None),
    ("PA-2026-0402", "Thomas White", "1985-10-09", "MEM-100011", "Danbury Sleep Center", "1234567111", "CPT-95811", "Polysomnography - In-Lab Sleep Study", &["G47.33", "R06.83"], "2026-01-31 08:30:00", RequestStatus::Denied, Priority::Medium, None),
    ("PA-2026-0401", "Jennifer Lee", "1976-02-28", "MEM-100012", "Norwalk Breast Center", "1234567112", "CPT-19083", "Stereotactic Breast Biopsy", &["N63.0", "R92.1"], "2026-01-30 14:00:00", RequestStatus::Approved, Priority::High, None),
    ("PA-2026-0400", "Christopher Clark", "1958-11-12", "MEM-100013", "Meriden DME Supply", "1234567213", "HCPCS-E0601", "CPAP Device - Continuous Positive Airway Pressure", &["G47.33"], "2026-01-30 10:45:00", RequestStatus::Pending, Priority::Medium, None),
    ("PA-2026-0399", "Amanda Harris", "1970-07-04", "MEM-100014", "Milford Cardiology Center", "1234567114", "CPT-92928", "Percutaneous Coronary Intervention with Stent", &["I25.10", "I25.110"], "2026-01-29 16:00:00", RequestStatus::Review, Priority::High, Some("Dr. Sarah Johnson")),
    ("PA-2026-0398", "Daniel Moore", "1992-03-30", "MEM-100015", "Shelton Rehabilitation Center", "1234567215", "CPT-97530", "Physical Rehabilitation - Therapeutic Activities", &["I63.9", "G81.90"], "2026-01-29 09:30:00", RequestStatus::Pending, Priority::High, None),
];

fn date(s: &str) -> NaiveDate {
    s.parse().unwrap_or_default()
}

fn timestamp(s: &str) -> DateTime<Utc> {
    NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S")
        .map(|dt| dt.and_utc())
        .unwrap_or_default()
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

/// The demo request queue, newest submission first.
///
/// Statuses are the ones each request carried before its last review; the
/// criteria heuristic leans on them when it cannot decide from evidence.
pub fn sample_requests() -> Vec<Request> {
    REQUESTS
        .iter()
        .map(
            |&(id, patient, dob, member, provider, npi, code, name, dx, submitted, status, priority, assigned)| {
                Request {
                    request_id: id.to_string(),
                    patient_name: patient.to_string(),
                    patient_dob: Some(date(dob)),
                    member_id: member.to_string(),
                    provider: provider.to_string(),
                    provider_npi: Some(npi.to_string()),
                    procedure_code: code.to_string(),
                    procedure_name: name.to_string(),
                    diagnosis_codes: strings(dx),
                    submitted_at: timestamp(submitted),
                    status,
                    priority,
                    assigned_to: assigned.map(str::to_string),
                    document_url: Some(format!("/documents/{id}.pdf")),
                    decision_rationale: None,
                    decision_date: None,
                    updated_at: None,
                }
            },
        )
        .collect()
}

// ── MockReferenceData ─────────────────────────────────────────────────────────

/// In-memory member and claims systems.
///
/// `set_unavailable(true)` makes every read fail with `PreauthError::Storage`,
/// which is how tests exercise a backend outage.
pub struct MockReferenceData {
    members: BTreeMap<String, MemberRecord>,
    claims: Vec<ClaimRecord>,
    unavailable: AtomicBool,
}

impl MockReferenceData {
    /// Build the data set with claim dates counted back from `anchor`.
    pub fn new(anchor: NaiveDate) -> Self {
        let members = MEMBERS
            .iter()
            .map(|row| {
                let record = MemberRecord {
                    member_id: row.0.to_string(),
                    first_name: row.1.to_string(),
                    last_name: row.2.to_string(),
                    date_of_birth: date(row.3),
                    gender: row.4.to_string(),
                    phone: row.5.to_string(),
                    email: row.6.to_string(),
                    plan_type: row.7.to_string(),
                    plan_id: row.8.to_string(),
                    group_number: row.9.to_string(),
                    effective_date: date(row.10),
                    termination_date: row.11.map(date),
                    coverage_level: row.12.to_string(),
                    copay_primary: row.13,
                    copay_specialist: row.14,
                    deductible_annual: row.15,
                    deductible_met: row.16,
                    max_out_of_pocket: row.17,
                    oop_met: row.18,
                    is_active: row.19,
                    pre_auth_required: true,
                    pcp_name: row.20.to_string(),
                    pcp_npi: row.21.to_string(),
                };
                (record.member_id.clone(), record)
            })
            .collect();

        let claims = CLAIMS
            .iter()
            .enumerate()
            .map(
                |(i, &(member, days_ago, provider, facility, cpt, desc, dx, billed, paid, resp, status, denial, service, auth))| {
                    ClaimRecord {
                        claim_id: format!("CLM-2025-{:05}", i + 1),
                        member_id: member.to_string(),
                        service_date: anchor.checked_sub_days(Days::new(days_ago)).unwrap_or(anchor),
                        provider_name: provider.to_string(),
                        facility_name: facility.to_string(),
                        cpt_code: cpt.to_string(),
                        cpt_description: desc.to_string(),
                        icd10_codes: strings(dx),
                        billed_amount: billed,
                        paid_amount: paid,
                        patient_responsibility: resp,
                        claim_status: status.to_string(),
                        denial_reason: denial.map(str::to_string),
                        service_type: service.to_string(),
                        auth_number: auth.map(str::to_string),
                    }
                },
            )
            .collect();

        Self {
            members,
            claims,
            unavailable: AtomicBool::new(false),
        }
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    pub fn member_count(&self) -> usize {
        self.members.len()
    }

    fn check_available(&self, system: &str) -> PreauthResult<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(PreauthError::Storage {
                reason: format!("{system} unavailable"),
            });
        }
        Ok(())
    }
}

impl Default for MockReferenceData {
    /// Anchored at today's date.
    fn default() -> Self {
        Self::new(Utc::now().date_naive())
    }
}

#[async_trait]
impl ReferenceData for MockReferenceData {
    async fn member(&self, member_id: &str) -> PreauthResult<Option<MemberRecord>> {
        self.check_available("member system")?;
        Ok(self.members.get(member_id).cloned())
    }

    async fn claims_between(
        &self,
        member_id: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> PreauthResult<Vec<ClaimRecord>> {
        self.check_available("claims system")?;
        let mut claims: Vec<ClaimRecord> = self
            .claims
            .iter()
            .filter(|c| c.member_id == member_id && c.service_date >= from && c.service_date <= to)
            .cloned()
            .collect();
        claims.sort_by(|a, b| b.service_date.cmp(&a.service_date));
        Ok(claims)
    }
}
