//! ESRI ASCII grid writer and reader.
//!
//! The format stores a single cell size, so only square-celled fields can be
//! written. Use [`crate::regrid`] to bring a field onto a square grid first.

use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;

use ocean_common::{GridTransform, VariableField};
use tracing::debug;

use crate::error::{ExportError, Result};
use crate::geotiff::filled_values;

/// Write a square-celled field as an ESRI ASCII grid.
pub fn write_ascii_grid(path: &Path, field: &VariableField, fill_value: f32) -> Result<()> {
    let transform = field.transform();
    if !transform.is_square() {
        return Err(ExportError::NonSquareCells {
            x: transform.pixel_width,
            y: transform.pixel_height,
        });
    }

    let bounds = transform.bounds(field.width(), field.height());
    let data = filled_values(field, fill_value);

    let mut out = BufWriter::new(File::create(path)?);
    writeln!(out, "ncols {}", field.width())?;
    writeln!(out, "nrows {}", field.height())?;
    writeln!(out, "xllcorner {}", bounds.west())?;
    writeln!(out, "yllcorner {}", bounds.south())?;
    writeln!(out, "cellsize {}", transform.pixel_width)?;
    writeln!(out, "NODATA_value {}", fill_value)?;

    for row in data.chunks(field.width()) {
        let line: Vec<String> = row.iter().map(|v| v.to_string()).collect();
        writeln!(out, "{}", line.join(" "))?;
    }
    out.flush()?;

    debug!(
        variable = %field.name(),
        path = %path.display(),
        cellsize = transform.pixel_width,
        "Wrote ASCII grid"
    );

    Ok(())
}

/// Read an ESRI ASCII grid into a field named after the file stem.
///
/// Accepts both `xllcorner`/`yllcorner` and `xllcenter`/`yllcenter` headers.
pub fn read_ascii_grid(path: &Path) -> Result<VariableField> {
    let name = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let content = fs::read_to_string(path)?;

    let mut header: HashMap<String, f64> = HashMap::new();
    let mut values: Vec<f32> = Vec::new();

    for line in content.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let first = line.split_whitespace().next().unwrap_or_default();
        if values.is_empty() && first.chars().next().map_or(false, char::is_alphabetic) {
            let mut parts = line.split_whitespace();
            let key = parts.next().unwrap_or_default().to_lowercase();
            let value = parts
                .next()
                .and_then(|v| v.parse::<f64>().ok())
                .ok_or_else(|| ExportError::invalid_geometry(format!("bad header line: {}", line)))?;
            header.insert(key, value);
            continue;
        }

        for token in line.split_whitespace() {
            let value = token
                .parse::<f32>()
                .map_err(|_| ExportError::invalid_geometry(format!("bad cell value: {}", token)))?;
            values.push(value);
        }
    }

    let get = |key: &str| {
        header
            .get(key)
            .copied()
            .ok_or_else(|| ExportError::invalid_geometry(format!("missing header '{}'", key)))
    };

    let ncols = get("ncols")? as usize;
    let nrows = get("nrows")? as usize;
    let cellsize = get("cellsize")?;

    let (west, south) = match (header.get("xllcorner"), header.get("yllcorner")) {
        (Some(&x), Some(&y)) => (x, y),
        _ => (
            get("xllcenter")? - cellsize / 2.0,
            get("yllcenter")? - cellsize / 2.0,
        ),
    };

    let north = south + nrows as f64 * cellsize;
    let transform = GridTransform::from_origin(west, north, cellsize, cellsize);
    let field = VariableField::new(name, values, ncols, nrows, transform)?;

    Ok(match header.get("nodata_value") {
        Some(&nodata) => field.with_nodata(nodata as f32),
        None => field,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_rejects_rectangular_cells() {
        let dir = TempDir::new().unwrap();
        let transform = GridTransform::from_origin(0.0, 10.0, 1.0, 0.5);
        let field = VariableField::new("sst", vec![1.0; 4], 2, 2, transform).unwrap();

        let result = write_ascii_grid(&dir.path().join("sst.asc"), &field, -9999.0);
        assert!(matches!(result, Err(ExportError::NonSquareCells { .. })));
    }

    #[test]
    fn test_header_layout() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("u.asc");
        let transform = GridTransform::from_origin(-80.0, 35.0, 0.5, 0.5);
        let field =
            VariableField::new("u", vec![1.0, 2.0, f32::NAN, 4.0, 5.0, 6.0], 3, 2, transform)
                .unwrap();

        write_ascii_grid(&path, &field, -9999.0).unwrap();
        let text = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(lines[0], "ncols 3");
        assert_eq!(lines[1], "nrows 2");
        assert_eq!(lines[2], "xllcorner -80");
        assert_eq!(lines[3], "yllcorner 34");
        assert_eq!(lines[4], "cellsize 0.5");
        assert_eq!(lines[5], "NODATA_value -9999");
        assert_eq!(lines[6], "1 2 -9999");
        assert_eq!(lines[7], "4 5 6");
    }

    #[test]
    fn test_read_center_registered_header() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("grid.asc");
        fs::write(
            &path,
            "ncols 2\nnrows 2\nxllcenter 0.5\nyllcenter 0.5\ncellsize 1\n1 2\n3 4\n",
        )
        .unwrap();

        let field = read_ascii_grid(&path).unwrap();
        assert_eq!(field.transform().west, 0.0);
        assert_eq!(field.transform().north, 2.0);
        assert_eq!(field.nodata(), None);
        assert_eq!(field.get(1, 1), Some(4.0));
    }
}
