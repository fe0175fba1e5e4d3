//! GeoPackage raster output using the 2D gridded coverage extension.
//!
//! Each file holds one coverage table with a single zoom level and a single
//! tile covering the whole field. Tiles are float32 TIFFs, which is the
//! encoding the extension prescribes for `datatype = 'float'`.

use std::fs;
use std::io::Cursor;
use std::path::Path;

use ocean_common::{CrsCode, GridTransform, VariableField};
use rusqlite::{params, Connection, OptionalExtension};
use tracing::debug;

use crate::error::{ExportError, Result};
use crate::geotiff::{decode_float_tiff, encode_float_tiff, filled_values};

/// "GPKG" as a big-endian integer.
const GPKG_APPLICATION_ID: i32 = 0x4750_4B47;
const GPKG_USER_VERSION: i32 = 10300;

const COVERAGE_DATA_TYPE: &str = "2d-gridded-coverage";
const COVERAGE_EXTENSION: &str = "gpkg_2d_gridded_coverage";
const COVERAGE_DEFINITION: &str = "http://docs.opengeospatial.org/is/17-066r1/17-066r1.html";

/// Write a field as a single-tile GeoPackage coverage.
///
/// Any existing file at `path` is removed first; GeoPackages are databases
/// and would otherwise accumulate tables.
pub fn write_geopackage(path: &Path, field: &VariableField, fill_value: f32) -> Result<()> {
    if path.exists() {
        fs::remove_file(path)?;
    }

    let table = table_name(field.name());
    let transform = field.transform();
    let bounds = transform.bounds(field.width(), field.height());
    let data = filled_values(field, fill_value);

    let mut tile = Vec::new();
    encode_float_tiff(
        Cursor::new(&mut tile),
        &data,
        field.width(),
        field.height(),
        None,
    )?;

    let mut conn = Connection::open(path)?;
    conn.execute_batch(&format!(
        "PRAGMA application_id = {}; PRAGMA user_version = {};",
        GPKG_APPLICATION_ID, GPKG_USER_VERSION
    ))?;

    let tx = conn.transaction()?;
    tx.execute_batch(include_str!("gpkg_schema.sql"))?;

    let srs_id = i64::from(transform.crs.epsg());
    tx.execute(
        "INSERT INTO gpkg_spatial_ref_sys (srs_name, srs_id, organization, organization_coordsys_id, definition)
         VALUES (?1, ?2, 'EPSG', ?2, ?3)",
        params![transform.crs.name(), srs_id, srs_definition(transform.crs)],
    )?;

    tx.execute_batch(&format!(
        "CREATE TABLE \"{table}\" (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            zoom_level INTEGER NOT NULL,
            tile_column INTEGER NOT NULL,
            tile_row INTEGER NOT NULL,
            tile_data BLOB NOT NULL,
            UNIQUE (zoom_level, tile_column, tile_row)
        );"
    ))?;

    tx.execute(
        "INSERT INTO gpkg_contents (table_name, data_type, identifier, min_x, min_y, max_x, max_y, srs_id)
         VALUES (?1, ?2, ?1, ?3, ?4, ?5, ?6, ?7)",
        params![
            table,
            COVERAGE_DATA_TYPE,
            bounds.west(),
            bounds.south(),
            bounds.east(),
            bounds.north(),
            srs_id
        ],
    )?;

    tx.execute(
        "INSERT INTO gpkg_tile_matrix_set (table_name, srs_id, min_x, min_y, max_x, max_y)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            table,
            srs_id,
            bounds.west(),
            bounds.south(),
            bounds.east(),
            bounds.north()
        ],
    )?;

    tx.execute(
        "INSERT INTO gpkg_tile_matrix
         (table_name, zoom_level, matrix_width, matrix_height, tile_width, tile_height, pixel_x_size, pixel_y_size)
         VALUES (?1, 0, 1, 1, ?2, ?3, ?4, ?5)",
        params![
            table,
            field.width() as i64,
            field.height() as i64,
            transform.pixel_width,
            transform.pixel_height
        ],
    )?;

    for (ext_table, column) in [
        ("gpkg_2d_gridded_coverage_ancillary", None),
        ("gpkg_2d_gridded_tile_ancillary", None),
        (table.as_str(), Some("tile_data")),
    ] {
        tx.execute(
            "INSERT INTO gpkg_extensions (table_name, column_name, extension_name, definition, scope)
             VALUES (?1, ?2, ?3, ?4, 'read-write')",
            params![ext_table, column, COVERAGE_EXTENSION, COVERAGE_DEFINITION],
        )?;
    }

    tx.execute(
        "INSERT INTO gpkg_2d_gridded_coverage_ancillary
         (tile_matrix_set_name, datatype, scale, offset, precision, data_null, grid_cell_encoding, field_name, quantity_definition)
         VALUES (?1, 'float', 1.0, 0.0, 1.0, ?2, 'grid-value-is-area', ?3, ?3)",
        params![table, f64::from(fill_value), field.name()],
    )?;

    tx.execute(
        &format!(
            "INSERT INTO \"{table}\" (zoom_level, tile_column, tile_row, tile_data) VALUES (0, 0, 0, ?1)"
        ),
        params![tile],
    )?;
    let tile_id = tx.last_insert_rowid();

    let (min, max, mean) = match tile_statistics(field) {
        Some((min, max, mean)) => (Some(min), Some(max), Some(mean)),
        None => (None, None, None),
    };
    tx.execute(
        "INSERT INTO gpkg_2d_gridded_tile_ancillary (tpudt_name, tpudt_id, scale, offset, min, max, mean)
         VALUES (?1, ?2, 1.0, 0.0, ?3, ?4, ?5)",
        params![table, tile_id, min, max, mean],
    )?;

    tx.commit()?;

    debug!(
        variable = %field.name(),
        path = %path.display(),
        table = %table,
        "Wrote GeoPackage coverage"
    );

    Ok(())
}

/// Read the first gridded coverage of a GeoPackage back into a field.
pub fn read_geopackage(path: &Path) -> Result<VariableField> {
    let conn = Connection::open(path)?;

    let (table, srs_id): (String, i64) = conn
        .query_row(
            "SELECT table_name, srs_id FROM gpkg_contents WHERE data_type = ?1 ORDER BY table_name LIMIT 1",
            params![COVERAGE_DATA_TYPE],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .optional()?
        .ok_or_else(|| ExportError::GeoPackage("no gridded coverage found".to_string()))?;

    let (west, north): (f64, f64) = conn.query_row(
        "SELECT min_x, max_y FROM gpkg_tile_matrix_set WHERE table_name = ?1",
        params![table],
        |row| Ok((row.get(0)?, row.get(1)?)),
    )?;

    let (pixel_x, pixel_y): (f64, f64) = conn.query_row(
        "SELECT pixel_x_size, pixel_y_size FROM gpkg_tile_matrix WHERE table_name = ?1 AND zoom_level = 0",
        params![table],
        |row| Ok((row.get(0)?, row.get(1)?)),
    )?;

    let data_null: Option<f64> = conn
        .query_row(
            "SELECT data_null FROM gpkg_2d_gridded_coverage_ancillary WHERE tile_matrix_set_name = ?1",
            params![table],
            |row| row.get(0),
        )
        .optional()?
        .flatten();

    let field_name: String = conn
        .query_row(
            "SELECT field_name FROM gpkg_2d_gridded_coverage_ancillary WHERE tile_matrix_set_name = ?1",
            params![table],
            |row| row.get(0),
        )
        .optional()?
        .unwrap_or_else(|| table.clone());

    let blob: Vec<u8> = conn.query_row(
        &format!("SELECT tile_data FROM \"{table}\" WHERE zoom_level = 0 AND tile_column = 0 AND tile_row = 0"),
        [],
        |row| row.get(0),
    )?;

    let (data, width, height) = decode_float_tiff(Cursor::new(blob))?;

    let crs = u16::try_from(srs_id)
        .ok()
        .and_then(|code| CrsCode::parse(&format!("EPSG:{}", code)).ok())
        .unwrap_or_default();
    let transform = GridTransform::from_origin(west, north, pixel_x, pixel_y).with_crs(crs);
    let field = VariableField::new(field_name, data, width, height, transform)?;

    Ok(match data_null {
        Some(nodata) => field.with_nodata(nodata as f32),
        None => field,
    })
}

/// SQL-safe coverage table name derived from a variable name.
fn table_name(variable: &str) -> String {
    let mut name: String = variable
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect();

    if name.is_empty() || name.starts_with(|c: char| c.is_ascii_digit()) {
        name.insert_str(0, "coverage_");
    }

    name
}

fn tile_statistics(field: &VariableField) -> Option<(f64, f64, f64)> {
    let (min, max) = field.value_range()?;
    let valid: Vec<f64> = field
        .values()
        .iter()
        .filter(|&&v| !field.is_missing(v))
        .map(|&v| f64::from(v))
        .collect();
    let mean = valid.iter().sum::<f64>() / valid.len() as f64;

    Some((f64::from(min), f64::from(max), mean))
}

fn srs_definition(crs: CrsCode) -> &'static str {
    match crs {
        CrsCode::Epsg4326 => {
            "GEOGCS[\"WGS 84\",DATUM[\"WGS_1984\",SPHEROID[\"WGS 84\",6378137,298.257223563,\
             AUTHORITY[\"EPSG\",\"7030\"]],AUTHORITY[\"EPSG\",\"6326\"]],PRIMEM[\"Greenwich\",0,\
             AUTHORITY[\"EPSG\",\"8901\"]],UNIT[\"degree\",0.0174532925199433,\
             AUTHORITY[\"EPSG\",\"9122\"]],AUTHORITY[\"EPSG\",\"4326\"]]"
        }
        CrsCode::Epsg4269 => {
            "GEOGCS[\"NAD83\",DATUM[\"North_American_Datum_1983\",SPHEROID[\"GRS 1980\",6378137,298.257222101,\
             AUTHORITY[\"EPSG\",\"7019\"]],AUTHORITY[\"EPSG\",\"6269\"]],PRIMEM[\"Greenwich\",0,\
             AUTHORITY[\"EPSG\",\"8901\"]],UNIT[\"degree\",0.0174532925199433,\
             AUTHORITY[\"EPSG\",\"9122\"]],AUTHORITY[\"EPSG\",\"4269\"]]"
        }
        CrsCode::Epsg3857 => {
            "PROJCS[\"WGS 84 / Pseudo-Mercator\",GEOGCS[\"WGS 84\",DATUM[\"WGS_1984\",\
             SPHEROID[\"WGS 84\",6378137,298.257223563]],PRIMEM[\"Greenwich\",0],\
             UNIT[\"degree\",0.0174532925199433]],PROJECTION[\"Mercator_1SP\"],\
             PARAMETER[\"central_meridian\",0],PARAMETER[\"scale_factor\",1],\
             PARAMETER[\"false_easting\",0],PARAMETER[\"false_northing\",0],\
             UNIT[\"metre\",1],AUTHORITY[\"EPSG\",\"3857\"]]"
        }
    }
}
