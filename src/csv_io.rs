// 📂 CSV plumbing - data directory, roster import and report exports
//
// The data directory holds one CSV per collection:
//   students.csv, authorizations.csv, checkins.csv, events.csv
// Event payloads are stored as a JSON string column.
// Files are loaded and saved whole. A missing file is an empty collection.
//
// Exports use `;` as separator and the column layouts the school's
// spreadsheets expect.

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::clock::Clock;
use crate::desk::CheckinDesk;
use crate::entities::{
    AuthorizationRegistry, DailyAuthorization, Membership, Student, StudentRegistry,
};
use crate::error::ImportError;
use crate::report::{DailyReport, MonthlyReport};
use crate::store::{AttendanceStore, CheckinRecord, Event};

pub const STUDENTS_FILE: &str = "students.csv";
pub const AUTHORIZATIONS_FILE: &str = "authorizations.csv";
pub const CHECKINS_FILE: &str = "checkins.csv";
pub const EVENTS_FILE: &str = "events.csv";

const EXPORT_DELIMITER: u8 = b';';

// ============================================================================
// DATA DIRECTORY
// ============================================================================

#[derive(Debug, Clone)]
pub struct DataDir {
    root: PathBuf,
}

impl DataDir {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        DataDir {
            root: root.as_ref().to_path_buf(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn students_path(&self) -> PathBuf {
        self.root.join(STUDENTS_FILE)
    }

    pub fn authorizations_path(&self) -> PathBuf {
        self.root.join(AUTHORIZATIONS_FILE)
    }

    pub fn checkins_path(&self) -> PathBuf {
        self.root.join(CHECKINS_FILE)
    }

    pub fn events_path(&self) -> PathBuf {
        self.root.join(EVENTS_FILE)
    }

    /// Load every collection into a desk driven by `clock`
    pub fn load<C: Clock>(&self, clock: C) -> Result<CheckinDesk<C>> {
        let students: Vec<Student> = read_records(&self.students_path())?;
        let authorizations: Vec<DailyAuthorization> = read_records(&self.authorizations_path())?;
        let checkins: Vec<CheckinRecord> = read_records(&self.checkins_path())?;
        let events = read_records::<EventRow>(&self.events_path())?
            .into_iter()
            .map(EventRow::into_event)
            .collect::<Result<Vec<Event>>>()?;

        info!(
            students = students.len(),
            authorizations = authorizations.len(),
            checkins = checkins.len(),
            events = events.len(),
            dir = %self.root.display(),
            "data directory loaded"
        );

        Ok(CheckinDesk::with_data(
            clock,
            StudentRegistry::from_students(students),
            AuthorizationRegistry::from_authorizations(authorizations),
            AttendanceStore::from_parts(checkins, events),
        ))
    }

    /// Write every collection back
    pub fn save<C: Clock>(&self, desk: &CheckinDesk<C>) -> Result<()> {
        fs::create_dir_all(&self.root)
            .with_context(|| format!("Failed to create data directory: {:?}", self.root))?;

        write_records(&self.students_path(), desk.roster.all())?;
        write_records(&self.authorizations_path(), desk.authorizations.all())?;
        write_records(&self.checkins_path(), desk.store.all())?;
        let events = desk
            .store
            .events()
            .iter()
            .map(EventRow::from_event)
            .collect::<Result<Vec<EventRow>>>()?;
        write_records(&self.events_path(), &events)?;

        debug!(dir = %self.root.display(), "data directory saved");
        Ok(())
    }
}

/// Flat CSV form of an audit event
#[derive(Debug, Serialize, Deserialize)]
struct EventRow {
    event_id: String,
    timestamp: DateTime<Utc>,
    event_type: String,
    entity_id: String,
    data: String,
}

impl EventRow {
    fn from_event(event: &Event) -> Result<Self> {
        Ok(EventRow {
            event_id: event.event_id.clone(),
            timestamp: event.timestamp,
            event_type: event.event_type.clone(),
            entity_id: event.entity_id.clone(),
            data: serde_json::to_string(&event.data)
                .with_context(|| format!("Failed to encode event {}", event.event_id))?,
        })
    }

    fn into_event(self) -> Result<Event> {
        let data = serde_json::from_str(&self.data)
            .with_context(|| format!("Failed to decode payload of event {}", self.event_id))?;
        Ok(Event {
            event_id: self.event_id,
            timestamp: self.timestamp,
            event_type: self.event_type,
            entity_id: self.entity_id,
            data,
        })
    }
}

fn read_records<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
    if !path.exists() {
        return Ok(Vec::new());
    }

    let mut rdr = csv::Reader::from_path(path)
        .with_context(|| format!("Failed to open CSV file: {:?}", path))?;

    let mut items = Vec::new();
    for result in rdr.deserialize() {
        let item: T = result.with_context(|| format!("Failed to deserialize row in {:?}", path))?;
        items.push(item);
    }
    Ok(items)
}

fn write_records<T: Serialize>(path: &Path, items: &[T]) -> Result<()> {
    let mut wtr = csv::Writer::from_path(path)
        .with_context(|| format!("Failed to create CSV file: {:?}", path))?;
    for item in items {
        wtr.serialize(item)?;
    }
    wtr.flush()?;
    Ok(())
}

// ============================================================================
// ROSTER IMPORT
// ============================================================================

fn find_column(headers: &csv::StringRecord, names: &[&str]) -> Option<usize> {
    headers
        .iter()
        .position(|h| names.contains(&h.trim().to_lowercase().as_str()))
}

/// Parse a roster CSV (comma separated, `Nome`/`Name` and `Turma`/`Class`
/// columns, any order, case-insensitive).
///
/// Every imported student gets `membership`; monthly contracts start on
/// `today`. Rows lacking a name or a class are skipped.
pub fn import_students<R: Read>(
    reader: R,
    membership: Membership,
    today: NaiveDate,
) -> std::result::Result<Vec<Student>, ImportError> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let headers = rdr.headers()?.clone();
    let name_idx = find_column(&headers, &["nome", "name"]).ok_or(ImportError::MissingColumn("Nome"));
    let class_idx = find_column(&headers, &["turma", "class"]).ok_or(ImportError::MissingColumn("Turma"));

    let rows: Vec<csv::StringRecord> = rdr.records().collect::<std::result::Result<_, _>>()?;
    if rows.is_empty() {
        return Err(ImportError::Empty);
    }
    let (name_idx, class_idx) = (name_idx?, class_idx?);

    let note = format!("Imported on {}", today.format("%Y-%m-%d"));
    let students: Vec<Student> = rows
        .iter()
        .filter_map(|row| {
            let name = row.get(name_idx).unwrap_or("").trim();
            let class_label = row.get(class_idx).unwrap_or("").trim();
            if name.is_empty() || class_label.is_empty() {
                return None;
            }
            let mut student = Student::new(name, class_label, membership).with_note(&note);
            if membership == Membership::MonthlyContract {
                student.membership_start = Some(today);
            }
            Some(student)
        })
        .collect();

    if students.is_empty() {
        return Err(ImportError::NoValidRows);
    }
    Ok(students)
}

/// Blank import template
pub fn write_import_template<W: Write>(writer: W) -> Result<()> {
    let mut wtr = csv::Writer::from_writer(writer);
    wtr.write_record(["Nome", "Turma"])?;
    wtr.flush()?;
    Ok(())
}

// ============================================================================
// EXPORTS
// ============================================================================

fn export_writer<W: Write>(writer: W) -> csv::Writer<W> {
    csv::WriterBuilder::new()
        .delimiter(EXPORT_DELIMITER)
        .from_writer(writer)
}

/// One day's check-ins, newest first
pub fn export_history<W: Write>(
    writer: W,
    records: &[&CheckinRecord],
    roster: &StudentRegistry,
) -> Result<()> {
    let mut wtr = export_writer(writer);
    wtr.write_record([
        "Student",
        "Class",
        "Time",
        "Meal",
        "Membership",
        "Status",
        "Correction reason",
    ])?;

    for record in records {
        let student = roster.get(&record.student_id);
        let time = record.time.format("%H:%M").to_string();
        wtr.write_record([
            student.map_or("N/A", |s| s.name.as_str()),
            student.map_or("N/A", |s| s.class_label.as_str()),
            time.as_str(),
            record.meal.label(),
            record.membership_at_checkin.label(),
            if record.valid { "Valid" } else { "Invalidated" },
            record.correction_reason.as_str(),
        ])?;
    }
    wtr.flush()?;
    Ok(())
}

/// Per-category totals of one day
pub fn export_daily<W: Write>(writer: W, report: &DailyReport) -> Result<()> {
    let mut wtr = export_writer(writer);
    wtr.write_record(["Membership", "Lunch", "Snack", "Combo"])?;

    for (membership, totals) in report.by_membership.iter() {
        wtr.write_record([
            membership.label().to_string(),
            totals.lunch.to_string(),
            totals.snack.to_string(),
            totals.combo.to_string(),
        ])?;
    }
    wtr.flush()?;
    Ok(())
}

/// Per-student totals of one category for a month, with a TOTAL row
pub fn export_monthly<W: Write>(
    writer: W,
    report: &MonthlyReport,
    membership: Membership,
) -> Result<()> {
    let mut wtr = export_writer(writer);
    wtr.write_record(["Student", "Class", "Lunch", "Snack", "Combo"])?;

    for entry in report.entries(membership) {
        wtr.write_record([
            entry.student.name.clone(),
            entry.student.class_label.clone(),
            entry.totals.lunch.to_string(),
            entry.totals.snack.to_string(),
            entry.totals.combo.to_string(),
        ])?;
    }

    let total = report.total(membership);
    wtr.write_record([
        "TOTAL".to_string(),
        String::new(),
        total.lunch.to_string(),
        total.snack.to_string(),
        total.combo.to_string(),
    ])?;
    wtr.flush()?;
    Ok(())
}

/// Students whose contract was cancelled
pub fn export_cancelled<W: Write>(writer: W, students: &[&Student]) -> Result<()> {
    let mut wtr = export_writer(writer);
    wtr.write_record(["Student", "Class", "Contract start", "Contract end", "Notes"])?;

    for student in students {
        let fmt_date = |d: Option<NaiveDate>| d.map(|d| d.to_string()).unwrap_or_default();
        wtr.write_record([
            student.name.clone(),
            student.class_label.clone(),
            fmt_date(student.membership_start),
            fmt_date(student.membership_end),
            student.note.replace('\n', " "),
        ])?;
    }
    wtr.flush()?;
    Ok(())
}

/// Create `path` with a UTF-8 BOM (spreadsheet friendly) and hand the file
/// to `write`.
pub fn export_to_file<F>(path: &Path, write: F) -> Result<()>
where
    F: FnOnce(&mut fs::File) -> Result<()>,
{
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create export directory: {:?}", parent))?;
    }
    let mut file = fs::File::create(path)
        .with_context(|| format!("Failed to create export file: {:?}", path))?;
    file.write_all("\u{FEFF}".as_bytes())?;
    write(&mut file)?;
    info!(path = %path.display(), "export written");
    Ok(())
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use crate::meal::MealType;
    use crate::report::{daily_report, monthly_report};
    use chrono::NaiveTime;

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, d).unwrap()
    }

    fn to_string(buf: Vec<u8>) -> String {
        String::from_utf8(buf).unwrap()
    }

    #[test]
    fn test_import_students() {
        let csv = "Nome,Turma\nAna Souza,5A\n,5B\nPedro,\nBia Lima,3C\n";

        let students = import_students(csv.as_bytes(), Membership::MonthlyContract, date(3)).unwrap();

        assert_eq!(students.len(), 2);
        assert_eq!(students[0].name, "Ana Souza");
        assert_eq!(students[0].class_label, "5A");
        assert_eq!(students[0].membership, Membership::MonthlyContract);
        assert_eq!(students[0].membership_start, Some(date(3)));
        assert_eq!(students[0].note, "Imported on 2024-06-03");
        assert_eq!(students[1].name, "Bia Lima");
    }

    #[test]
    fn test_import_students_any_column_order() {
        let csv = "turma, NAME ,extra\n5A,Ana,x\n";

        let students = import_students(csv.as_bytes(), Membership::DailyBasis, date(3)).unwrap();

        assert_eq!(students[0].name, "Ana");
        assert_eq!(students[0].class_label, "5A");
        assert!(students[0].membership_start.is_none());
    }

    #[test]
    fn test_import_students_errors() {
        assert!(matches!(
            import_students("Nome,Turma\n".as_bytes(), Membership::Observation, date(3)),
            Err(ImportError::Empty)
        ));
        assert!(matches!(
            import_students("Nome,Sala\nAna,5A\n".as_bytes(), Membership::Observation, date(3)),
            Err(ImportError::MissingColumn("Turma"))
        ));
        assert!(matches!(
            import_students("Aluno,Turma\nAna,5A\n".as_bytes(), Membership::Observation, date(3)),
            Err(ImportError::MissingColumn("Nome"))
        ));
        assert!(matches!(
            import_students("Nome,Turma\n,5A\nAna,\n".as_bytes(), Membership::Observation, date(3)),
            Err(ImportError::NoValidRows)
        ));
    }

    #[test]
    fn test_data_dir_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let data = DataDir::new(dir.path());
        let clock = FixedClock::new(date(3).and_hms_opt(11, 0, 0).unwrap());

        let mut desk = data.load(clock).unwrap();
        assert!(desk.roster.is_empty());

        let id = desk.roster.add(
            Student::new("Ana", "5A", Membership::MonthlyContract)
                .with_contract(date(1), None)
                .with_note("line one\nline two"),
        );
        desk.authorize_today(&id, "extra day").unwrap();
        desk.check_in(&id).unwrap();
        data.save(&desk).unwrap();

        let reloaded = data.load(clock).unwrap();
        assert_eq!(reloaded.roster.all(), desk.roster.all());
        assert_eq!(reloaded.authorizations.all(), desk.authorizations.all());
        assert_eq!(reloaded.store.all(), desk.store.all());
        assert_eq!(reloaded.roster.get(&id).unwrap().membership_end, None);
    }

    #[test]
    fn test_audit_trail_survives_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let data = DataDir::new(dir.path());
        let clock = FixedClock::new(date(3).and_hms_opt(11, 0, 0).unwrap());

        let mut desk = data.load(clock).unwrap();
        let id = desk.roster.add(Student::new("Ana", "5A", Membership::Observation));
        let record = match desk.check_in(&id).unwrap() {
            crate::desk::CheckinOutcome::Recorded(record) => record,
            other => panic!("unexpected {:?}", other),
        };
        desk.correct_membership(&record.id, Membership::DailyBasis, "paid; at the door")
            .unwrap();
        desk.invalidate(&record.id, "scanned \"twice\"").unwrap();
        assert_eq!(desk.store.events().len(), 3);
        data.save(&desk).unwrap();

        let reloaded = data.load(clock).unwrap();
        assert_eq!(reloaded.store.events(), desk.store.events());

        let trail = reloaded.store.events_for(&record.id);
        let corrected = trail[1];
        assert_eq!(corrected.data["from"], "observacao");
        assert_eq!(corrected.data["to"], "diaria");
        assert_eq!(corrected.data["reason"], "paid; at the door");
    }

    #[test]
    fn test_export_history() {
        let mut roster = StudentRegistry::new();
        let id = roster.add(Student::new("Ana", "5A", Membership::Observation));
        let mut record = CheckinRecord::new(
            &id,
            date(3),
            NaiveTime::from_hms_opt(11, 42, 10).unwrap(),
            MealType::Lunch,
            Membership::Observation,
        );
        record.valid = false;
        record.correction_reason = "wrong card".to_string();
        let orphan = CheckinRecord::new(
            "ghost",
            date(3),
            NaiveTime::from_hms_opt(8, 0, 0).unwrap(),
            MealType::MorningSnack,
            Membership::DailyBasis,
        );

        let mut buf = Vec::new();
        export_history(&mut buf, &[&record, &orphan], &roster).unwrap();

        let text = to_string(buf);
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "Student;Class;Time;Meal;Membership;Status;Correction reason");
        assert_eq!(lines[1], "Ana;5A;11:42;Lunch;Observation;Invalidated;wrong card");
        assert_eq!(lines[2], "N/A;N/A;08:00;Morning snack;Daily basis;Valid;");
    }

    #[test]
    fn test_export_daily_and_monthly() {
        let mut student = Student::new("Ana", "5A", Membership::MonthlyContract);
        student.id = "s1".to_string();
        let records = vec![
            CheckinRecord::new(
                "s1",
                date(3),
                NaiveTime::from_hms_opt(11, 0, 0).unwrap(),
                MealType::Lunch,
                Membership::MonthlyContract,
            ),
            CheckinRecord::new(
                "s1",
                date(4),
                NaiveTime::from_hms_opt(11, 0, 0).unwrap(),
                MealType::Lunch,
                Membership::MonthlyContract,
            ),
        ];

        let mut buf = Vec::new();
        export_daily(&mut buf, &daily_report(&records, date(3))).unwrap();
        let text = to_string(buf);
        assert_eq!(
            text.lines().collect::<Vec<_>>(),
            vec![
                "Membership;Lunch;Snack;Combo",
                "Monthly contract;1;0;0",
                "Daily basis;0;0;0",
                "Observation;0;0;0",
                "Cancelled;0;0;0",
            ]
        );

        let mut buf = Vec::new();
        let report = monthly_report(&records, &[student], 2024, 6);
        export_monthly(&mut buf, &report, Membership::MonthlyContract).unwrap();
        let text = to_string(buf);
        assert_eq!(
            text.lines().collect::<Vec<_>>(),
            vec!["Student;Class;Lunch;Snack;Combo", "Ana;5A;2;0;0", "TOTAL;;2;0;0"]
        );
    }

    #[test]
    fn test_export_cancelled() {
        let mut roster = StudentRegistry::new();
        let id = roster.add(
            Student::new("Rui", "2A", Membership::MonthlyContract).with_contract(date(1), None),
        );
        roster.cancel_contract(&id, date(30), "moved", date(20)).unwrap();

        let mut buf = Vec::new();
        export_cancelled(&mut buf, &roster.cancelled()).unwrap();
        let text = to_string(buf);
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "Student;Class;Contract start;Contract end;Notes");
        assert_eq!(
            lines[1],
            "Rui;2A;2024-06-01;2024-06-30;[Contract cancelled on 2024-06-20] Reason: moved"
        );
    }

    #[test]
    fn test_export_to_file_writes_bom() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("exports").join("daily.csv");

        export_to_file(&path, |file| {
            export_daily(file, &daily_report(&[], date(3)))
        })
        .unwrap();

        let bytes = fs::read(&path).unwrap();
        assert!(bytes.starts_with("\u{FEFF}".as_bytes()));
    }

    #[test]
    fn test_import_template() {
        let mut buf = Vec::new();
        write_import_template(&mut buf).unwrap();
        assert_eq!(to_string(buf), "Nome,Turma\n");
    }
}
