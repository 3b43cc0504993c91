// src/report.rs

use anyhow::{bail, Context, Result};
use serde::Serialize;
use std::{fs, path::Path};

use crate::clean::{clean_table, to_records, OccupationRecord};
use crate::table::Table;

/// Write serde rows as CSV. Headers come from the field names; `headers` is
/// written instead when there are no rows to take them from.
pub fn write_rows<T: Serialize>(path: &Path, headers: &[&str], rows: &[T]) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("creating directory {}", parent.display()))?;
    }
    let mut wtr = csv::Writer::from_path(path)
        .with_context(|| format!("creating CSV {}", path.display()))?;
    if rows.is_empty() {
        wtr.write_record(headers)
            .with_context(|| format!("writing header to {}", path.display()))?;
    }
    for row in rows {
        wtr.serialize(row)
            .with_context(|| format!("writing row to {}", path.display()))?;
    }
    wtr.flush()
        .with_context(|| format!("flushing CSV {}", path.display()))?;
    Ok(())
}

/// Read an extracted or cleaned OES CSV back into records. Cleaning is
/// idempotent, so either kind of file works.
pub fn read_records(path: &Path) -> Result<Vec<OccupationRecord>> {
    let table = clean_table(Table::read_csv(path)?);
    match to_records(&table) {
        Some(records) => Ok(records),
        None => bail!(
            "{} has no occupation column (headers: {:?})",
            path.display(),
            table.headers
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyze::{location_quotient_report, LqCategory, ReportRow};
    use tempfile::tempdir;

    #[test]
    fn reads_raw_portal_csv_into_records() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("riverside_2024_data.csv");
        fs::write(
            &path,
            "Occupation (SOC code),Employment(1),Location Quotient  ()\n\
             Cooks; Restaurant(35-2014),\"30,120\",() 1.12\n\
             Occupation (SOC code),Employment(1),Location Quotient  ()\n\
             Actors(27-2011),**,() 0.31\n",
        )?;
        let recs = read_records(&path)?;
        assert_eq!(recs.len(), 2);
        assert_eq!(recs[0].occupation, "Cooks; Restaurant");
        assert_eq!(recs[0].employment, Some(30_120.0));
        assert_eq!(recs[1].employment, None);
        assert_eq!(recs[1].location_quotient, Some(0.31));
        Ok(())
    }

    #[test]
    fn rejects_csv_without_occupation_column() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("x.csv");
        fs::write(&path, "a,b\n1,2\n")?;
        assert!(read_records(&path).is_err());
        Ok(())
    }

    #[test]
    fn report_rows_serialize_with_original_headers() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("report.csv");
        let recs = vec![OccupationRecord {
            occupation: "Farmworkers".into(),
            soc_code: Some("45-2092".into()),
            employment: Some(12_040.0),
            annual_mean_wage: Some(31_500.0),
            hourly_mean_wage: None,
            location_quotient: Some(3.5),
        }];
        let report = location_quotient_report(&recs);
        assert_eq!(report[0].category, LqCategory::VeryHigh);
        write_rows(&path, ReportRow::HEADERS, &report)?;
        assert_eq!(
            fs::read_to_string(&path)?,
            "Rank,Occupation,Location_Quotient,Category,SOC_Code,Employment,Annual_Mean_Wage,Hourly_Mean_Wage\n\
             1,Farmworkers,3.5,Very High Concentration,45-2092,12040,31500.0,\n"
        );
        Ok(())
    }

    #[test]
    fn empty_report_still_has_a_header() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("empty_report.csv");
        let recs = vec![OccupationRecord {
            occupation: "Cooks".into(),
            soc_code: None,
            employment: None,
            annual_mean_wage: None,
            hourly_mean_wage: None,
            location_quotient: None,
        }];
        let report = location_quotient_report(&recs);
        assert!(report.is_empty());
        write_rows(&path, ReportRow::HEADERS, &report)?;
        assert_eq!(
            fs::read_to_string(&path)?,
            format!("{}\n", ReportRow::HEADERS.join(","))
        );
        Ok(())
    }
}
