//! Console rendering of disks, profiles and outcomes.

use std::fmt::Write;

use vdisk::{DiskView, Outcome, StorageProfileRef};

const HEADER: [&str; 8] = [
    "BUS TYPE", "BUS", "UNIT", "SIZE (MB)", "THIN", "PROFILE", "OVERRIDE", "IOPS",
];

/// Render disks as an aligned table.
pub fn disk_table(disks: &[DiskView]) -> String {
    if disks.is_empty() {
        return "No disks found\n".to_string();
    }

    let rows: Vec<[String; 8]> = disks
        .iter()
        .map(|d| {
            [
                d.adapter_type.clone(),
                d.bus_number.to_string(),
                d.unit_number.to_string(),
                d.size_mb.to_string(),
                d.thin_provisioned.to_string(),
                d.storage_profile_name.clone().unwrap_or_else(|| "-".to_string()),
                d.override_vm_default.to_string(),
                d.iops.map_or_else(|| "-".to_string(), |i| i.to_string()),
            ]
        })
        .collect();

    let mut widths = HEADER.map(str::len);
    for row in &rows {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.len());
        }
    }

    let mut out = String::new();
    push_row(&mut out, HEADER.iter().copied(), &widths);
    for row in &rows {
        push_row(&mut out, row.iter().map(String::as_str), &widths);
    }
    out
}

fn push_row<'a>(out: &mut String, cells: impl Iterator<Item = &'a str>, widths: &[usize]) {
    let line = cells
        .zip(widths)
        .map(|(cell, &width)| format!("{cell:<width$}"))
        .collect::<Vec<_>>()
        .join("  ");
    let _ = writeln!(out, "{}", line.trim_end());
}

/// Render storage profile names, one per line.
pub fn profile_list(profiles: &[StorageProfileRef]) -> String {
    if profiles.is_empty() {
        return "No storage profiles available\n".to_string();
    }
    profiles.iter().map(|p| format!("{}\n", p.name)).collect()
}

/// Human-readable summary of an outcome.
pub fn outcome_message(outcome: Outcome) -> &'static str {
    match outcome {
        Outcome::Applied => "Reconfiguration applied",
        Outcome::TimedOut => {
            "Timed out waiting for the reconfiguration; it may still be applied"
        }
        Outcome::Abandoned => "Stopped waiting; the reconfiguration may still be applied",
        Outcome::ConfirmationRequired => "Disk not removed: pass --confirm to remove it",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn view(adapter: &str, unit: u32, size_mb: i64, profile: Option<&str>) -> DiskView {
        DiskView {
            disk_id: Some("2000".to_string()),
            adapter_type: adapter.to_string(),
            adapter_code: 5,
            bus_number: 0,
            unit_number: unit,
            size_mb,
            thin_provisioned: true,
            storage_profile_name: profile.map(str::to_string),
            override_vm_default: false,
            iops: None,
        }
    }

    #[test]
    fn test_disk_table_aligns_columns() {
        let table = disk_table(&[
            view("paravirtual", 0, 8192, Some("Standard")),
            view("sata", 12, 40, None),
        ]);
        let lines: Vec<&str> = table.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("BUS TYPE     BUS  UNIT"));
        assert!(lines[1].starts_with("paravirtual  0    0"));
        assert!(lines[2].starts_with("sata         0    12"));
        assert!(lines[2].contains(" - "));
    }

    #[test]
    fn test_empty_listings() {
        assert_eq!(disk_table(&[]), "No disks found\n");
        assert_eq!(profile_list(&[]), "No storage profiles available\n");
    }

    #[test]
    fn test_profile_list() {
        let profiles = vec![
            StorageProfileRef::new("Standard", "https://vcd/std"),
            StorageProfileRef::new("Gold", "https://vcd/gold"),
        ];
        assert_eq!(profile_list(&profiles), "Standard\nGold\n");
    }

    #[test]
    fn test_outcome_messages() {
        assert_eq!(outcome_message(Outcome::Applied), "Reconfiguration applied");
        assert!(outcome_message(Outcome::ConfirmationRequired).contains("--confirm"));
    }
}
