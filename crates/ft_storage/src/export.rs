//! Flat-file export of startup records. Columns round-trip field for field
//! so an exported file can be re-imported without loss. The investors cell
//! is a JSON array, since investor names are free text and any plain
//! separator could appear inside one.

use std::io::{Read, Write};

use chrono::{DateTime, Utc};

use ft_core::{Error, Result, StartupRecord};

const HEADER: &[&str] = &[
    "id",
    "name",
    "funding_amount",
    "funding_stage",
    "investors",
    "industry",
    "location",
    "website",
    "linkedin_profile",
    "source_url",
    "source_id",
    "discovered_at",
    "last_updated",
];

fn csv_err(e: csv::Error) -> Error {
    Error::Storage(format!("CSV error: {}", e))
}

fn opt(field: &Option<String>) -> &str {
    field.as_deref().unwrap_or("")
}

fn parse_opt(raw: &str) -> Option<String> {
    if raw.is_empty() {
        None
    } else {
        Some(raw.to_string())
    }
}

fn parse_ts(raw: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|d| d.with_timezone(&Utc))
        .map_err(|e| Error::Storage(format!("Bad timestamp {raw:?} in import: {e}")))
}

pub fn write_csv<W: Write>(records: &[StartupRecord], out: W) -> Result<()> {
    let mut writer = csv::Writer::from_writer(out);
    writer.write_record(HEADER).map_err(csv_err)?;
    for record in records {
        writer
            .write_record([
                record.id.as_str(),
                record.name.as_str(),
                opt(&record.funding_amount),
                opt(&record.funding_stage),
                &serde_json::to_string(&record.investors)?,
                opt(&record.industry),
                opt(&record.location),
                opt(&record.website),
                opt(&record.linkedin_profile),
                opt(&record.source_url),
                opt(&record.source_id),
                &record.discovered_at.to_rfc3339(),
                &record.last_updated.to_rfc3339(),
            ])
            .map_err(csv_err)?;
    }
    writer.flush()?;
    Ok(())
}

pub fn read_csv<R: Read>(input: R) -> Result<Vec<StartupRecord>> {
    let mut reader = csv::Reader::from_reader(input);
    let mut records = Vec::new();
    for row in reader.records() {
        let row = row.map_err(csv_err)?;
        if row.len() != HEADER.len() {
            return Err(Error::Storage(format!(
                "Expected {} columns, got {}",
                HEADER.len(),
                row.len()
            )));
        }
        let investors = if row[4].is_empty() {
            Vec::new()
        } else {
            serde_json::from_str(&row[4])?
        };
        records.push(StartupRecord {
            id: row[0].to_string(),
            name: row[1].to_string(),
            funding_amount: parse_opt(&row[2]),
            funding_stage: parse_opt(&row[3]),
            investors,
            industry: parse_opt(&row[5]),
            location: parse_opt(&row[6]),
            website: parse_opt(&row[7]),
            linkedin_profile: parse_opt(&row[8]),
            source_url: parse_opt(&row[9]),
            source_id: parse_opt(&row[10]),
            discovered_at: parse_ts(&row[11])?,
            last_updated: parse_ts(&row[12])?,
        });
    }
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Vec<StartupRecord> {
        let mut a = StartupRecord::new("Acme");
        a.funding_amount = Some("$5M".to_string());
        a.funding_stage = Some("Series A".to_string());
        a.investors = vec!["Fund One".to_string(), "Fund, Two".to_string()];
        a.industry = Some("Fintech".to_string());
        a.location = Some("Bengaluru, Karnataka".to_string());
        a.source_url = Some("https://example.com/a".to_string());

        let b = StartupRecord::new("Blank Fields Ltd");
        vec![a, b]
    }

    #[test]
    fn export_import_round_trip() {
        let records = sample();
        let mut buf = Vec::new();
        write_csv(&records, &mut buf).unwrap();

        let imported = read_csv(buf.as_slice()).unwrap();
        assert_eq!(imported.len(), records.len());
        for (original, restored) in records.iter().zip(&imported) {
            assert_eq!(original, restored);
        }
    }

    #[test]
    fn import_rejects_malformed_rows() {
        let data = "id,name\nonly-two,columns\n";
        assert!(read_csv(data.as_bytes()).is_err());
    }

    #[test]
    fn investor_names_containing_separators_survive() {
        let mut record = StartupRecord::new("Acme");
        record.investors = vec![
            "Alpha; Beta Partners".to_string(),
            "Gamma \"G\" Capital".to_string(),
        ];

        let mut buf = Vec::new();
        write_csv(&[record.clone()], &mut buf).unwrap();
        let imported = read_csv(buf.as_slice()).unwrap();
        assert_eq!(imported[0].investors, record.investors);
    }

    #[test]
    fn fields_with_commas_survive() {
        let records = sample();
        let mut buf = Vec::new();
        write_csv(&records, &mut buf).unwrap();
        let imported = read_csv(buf.as_slice()).unwrap();
        assert_eq!(
            imported[0].location.as_deref(),
            Some("Bengaluru, Karnataka")
        );
    }
}
