pub mod progress;

use std::fmt::Display;

use dialoguer::Select;
use dialoguer::theme::ColorfulTheme;

use crate::firmware::Mode;
use crate::host::readings::{SensorGrid, SensorReadings};
use crate::phy::{DecoderStats, FrameType};

pub fn print_banner() {
    println!("sensorlink-rs");
}

pub fn print_menu() {
    for mode in Mode::ALL {
        println!("  {}", mode.menu_line());
    }
}

/// Ask for a mode on the terminal
pub fn prompt_mode(default: Mode) -> Result<Mode, String> {
    let labels: Vec<String> = Mode::ALL.iter().map(|m| m.menu_line()).collect();
    let default_index = Mode::ALL
        .iter()
        .position(|&m| m == default)
        .unwrap_or(0);

    let index = Select::with_theme(&ColorfulTheme::default())
        .with_prompt("Select sensor mode")
        .items(&labels[..])
        .default(default_index)
        .interact()
        .map_err(|e| format!("Mode prompt failed: {}", e))?;

    Ok(Mode::ALL[index])
}

/// Grid rendered one row per line, fixed width cells
pub fn render_grid<T: Copy + Default + Display>(title: &str, grid: &SensorGrid<T>) -> String {
    let mut out = format!("{}\n", title);
    for row in grid.rows() {
        let cells: Vec<String> = row.iter().map(|v| format!("{:>7}", v)).collect();
        out.push_str(&cells.join(""));
        out.push('\n');
    }
    out
}

/// Latest grids of the sensors a mode reports
pub fn render_readings(mode: Mode, readings: &SensorReadings) -> String {
    mode.frame_types()
        .iter()
        .map(|&frame_type| {
            let title = format!("{:?} ({})", frame_type, frame_type.tag());
            match frame_type {
                FrameType::Distance1 => render_grid(&title, &readings.distance1),
                FrameType::Distance2 => render_grid(&title, &readings.distance2),
                FrameType::ThermalA => render_grid(&title, &readings.thermal_a),
                FrameType::ThermalB => render_grid(&title, &readings.thermal_b),
            }
        })
        .collect()
}

pub fn render_error_table(frame_type: FrameType, table: &[f64]) -> String {
    let mut out = format!("{:?} error table\n", frame_type);
    for row in table.chunks(frame_type.grid_width()) {
        let cells: Vec<String> = row.iter().map(|v| format!("{:>9.2}", v)).collect();
        out.push_str(&cells.join(""));
        out.push('\n');
    }
    out
}

pub fn print_stats(stats: &DecoderStats) {
    println!(
        "frames: {} ({} valid, {} invalid) | lines dropped: {} unknown, {} malformed, {} overflow",
        stats.frames(),
        stats.valid,
        stats.invalid,
        stats.unknown,
        stats.malformed,
        stats.overflowed
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_grid() {
        let mut grid = SensorGrid::<i16>::new(4, 2);
        grid.store_reversed(&[1, 2, 3, 4]);
        let text = render_grid("d1", &grid);
        assert_eq!(text, "d1\n      4      3\n      2      1\n");
    }

    #[test]
    fn test_render_readings_follows_mode() {
        let readings = SensorReadings::new();
        let text = render_readings(Mode::ThermalBoth, &readings);
        assert!(text.starts_with("ThermalB (L)\n"));
        assert!(text.contains("ThermalA (P)\n"));
        assert!(!text.contains("Distance1"));
        // 24 MLX rows + 8 AMG rows + two titles
        assert_eq!(text.lines().count(), 34);
    }

    #[test]
    fn test_render_error_table_rows() {
        let table = vec![0.5; 64];
        let text = render_error_table(FrameType::Distance1, &table);
        assert_eq!(text.lines().count(), 9);
    }
}
