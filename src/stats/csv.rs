use std::{collections::BTreeSet, path::Path};

use anyhow::{Context, Result};
use csv::Writer;

use super::ZonalStatRow;

/// Leading columns of the statistics table; extra attributes follow, sorted.
pub const FIXED_COLUMNS: [&str; 8] = [
    "alpha_3",
    "ADM_LEVEL",
    "ADM_PCODE",
    "ADM_REF",
    "season",
    "CHIRPS_mean",
    "CHIRPS_min",
    "CHIRPS_max",
];

/// Writes the statistics table. Null statistics and missing attributes are
/// left empty.
pub fn write_csv(rows: &[ZonalStatRow], file_path: &Path) -> Result<()> {
    let extra_columns: BTreeSet<&str> = rows
        .iter()
        .flat_map(|r| r.properties.keys().map(String::as_str))
        .filter(|k| !FIXED_COLUMNS.contains(k))
        .collect();

    let mut writer = Writer::from_path(file_path)
        .with_context(|| format!("Failed to create {}", file_path.display()))?;

    writer.write_record(FIXED_COLUMNS.iter().copied().chain(extra_columns.iter().copied()))?;

    for row in rows {
        let mut record = vec![
            row.country.clone(),
            row.admin_level.to_string(),
            row.pcode.clone(),
            row.reference_name.clone(),
            row.season.clone(),
            format_stat(row.mean),
            format_stat(row.min),
            format_stat(row.max),
        ];
        record.extend(
            extra_columns
                .iter()
                .map(|k| row.properties.get(*k).cloned().unwrap_or_default()),
        );
        writer.write_record(&record)?;
    }

    writer.flush()?;
    Ok(())
}

fn format_stat(value: Option<f64>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

// -- Tests -------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use tempfile::TempDir;

    fn row(pcode: &str, mean: Option<f64>, properties: &[(&str, &str)]) -> ZonalStatRow {
        ZonalStatRow {
            country: "KEN".to_string(),
            admin_level: 1,
            pcode: pcode.to_string(),
            reference_name: "Nairobi".to_string(),
            season: "marmay".to_string(),
            mean,
            min: mean,
            max: mean,
            properties: properties
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect::<BTreeMap<_, _>>(),
        }
    }

    #[test]
    fn should_write_fixed_then_sorted_extra_columns() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("subnational_anomaly_statistics.csv");
        let rows = vec![
            row("KE01", Some(-12.5), &[("ADM1_PCODE", "KE01"), ("Shape_Area", "2.5")]),
            row("KE02", None, &[("ADM1_PCODE", "KE02"), ("ADM0_EN", "Kenya")]),
        ];

        write_csv(&rows, &path).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(
            lines[0],
            "alpha_3,ADM_LEVEL,ADM_PCODE,ADM_REF,season,CHIRPS_mean,CHIRPS_min,CHIRPS_max,ADM0_EN,ADM1_PCODE,Shape_Area"
        );
        assert_eq!(lines[1], "KEN,1,KE01,Nairobi,marmay,-12.5,-12.5,-12.5,,KE01,2.5");
        assert_eq!(lines[2], "KEN,1,KE02,Nairobi,marmay,,,,Kenya,KE02,");
    }

    #[test]
    fn should_write_header_for_empty_table() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("stats.csv");

        write_csv(&[], &path).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(text.lines().count(), 1);
    }
}
