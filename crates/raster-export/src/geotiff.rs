//! GeoTIFF encoding and decoding for single-band float rasters.
//!
//! Georeferencing is stored with the standard GeoTIFF tags:
//! - ModelPixelScale (33550): `[pixel_width, pixel_height, 0]`
//! - ModelTiepoint (33922): raster (0, 0) tied to `(west, north)`
//! - GeoKeyDirectory (34735): model type, raster type and EPSG code
//!
//! The nodata value goes into the GDAL_NODATA tag (42113) as ASCII, which is
//! where GDAL-based readers look for it.
//!
//! The decoder reports these tags under their named [`Tag`] variants, so
//! lookups must use those rather than `Tag::Unknown`.

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Seek, Write};
use std::path::Path;

use ocean_common::{CrsCode, GridTransform, VariableField};
use tiff::decoder::{Decoder, DecodingResult};
use tiff::encoder::{colortype, TiffEncoder};
use tiff::tags::Tag;
use tracing::debug;

use crate::error::{ExportError, Result};

const KEY_GT_MODEL_TYPE: u16 = 1024;
const KEY_GT_RASTER_TYPE: u16 = 1025;
const KEY_GEOGRAPHIC_TYPE: u16 = 2048;
const KEY_PROJECTED_CS_TYPE: u16 = 3072;

const MODEL_TYPE_PROJECTED: u16 = 1;
const MODEL_TYPE_GEOGRAPHIC: u16 = 2;
const RASTER_PIXEL_IS_AREA: u16 = 1;

/// Write a field as a float32 GeoTIFF, replacing missing cells with `fill_value`.
///
/// An existing file at `path` is overwritten.
pub fn write_geotiff(path: &Path, field: &VariableField, fill_value: f32) -> Result<()> {
    let data = filled_values(field, fill_value);
    let file = BufWriter::new(File::create(path)?);

    encode_float_tiff(
        file,
        &data,
        field.width(),
        field.height(),
        Some((field.transform(), fill_value)),
    )?;

    debug!(
        variable = %field.name(),
        path = %path.display(),
        width = field.width(),
        height = field.height(),
        "Wrote GeoTIFF"
    );

    Ok(())
}

/// Read a single-band GeoTIFF back into a field.
///
/// The field is named after the file stem and carries the GDAL_NODATA value
/// when one is present.
pub fn read_geotiff(path: &Path) -> Result<VariableField> {
    let name = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();

    let file = BufReader::new(File::open(path)?);
    let mut decoder = Decoder::new(file)?;
    let (width, height) = decoder.dimensions()?;

    let scale = decoder
        .get_tag_f64_vec(Tag::ModelPixelScaleTag)
        .map_err(|_| ExportError::invalid_geometry("missing ModelPixelScale tag"))?;
    let tiepoint = decoder
        .get_tag_f64_vec(Tag::ModelTiepointTag)
        .map_err(|_| ExportError::invalid_geometry("missing ModelTiepoint tag"))?;

    if scale.len() < 2 || tiepoint.len() < 6 {
        return Err(ExportError::invalid_geometry(format!(
            "malformed geotransform tags: scale={:?} tiepoint={:?}",
            scale, tiepoint
        )));
    }

    // Tiepoint is [I, J, K, X, Y, Z]; shift the model point back to raster (0, 0).
    let west = tiepoint[3] - tiepoint[0] * scale[0];
    let north = tiepoint[4] + tiepoint[1] * scale[1];

    let crs = decoder
        .get_tag_u16_vec(Tag::GeoKeyDirectoryTag)
        .ok()
        .and_then(|keys| crs_from_geo_keys(&keys))
        .unwrap_or_default();

    let nodata = decoder
        .get_tag_ascii_string(Tag::GdalNodata)
        .ok()
        .and_then(|s| s.trim_matches(char::from(0)).trim().parse::<f32>().ok());

    let data = match decoder.read_image()? {
        DecodingResult::F32(data) => data,
        DecodingResult::F64(data) => data.into_iter().map(|v| v as f32).collect(),
        _ => {
            return Err(ExportError::Tiff(
                "only floating point samples are supported".to_string(),
            ))
        }
    };

    let transform = GridTransform::from_origin(west, north, scale[0], scale[1]).with_crs(crs);
    let field = VariableField::new(name, data, width as usize, height as usize, transform)?;

    Ok(match nodata {
        Some(nodata) => field.with_nodata(nodata),
        None => field,
    })
}

/// Encode a float32 single-band TIFF, optionally with georeferencing tags.
pub(crate) fn encode_float_tiff<W: Write + Seek>(
    writer: W,
    data: &[f32],
    width: usize,
    height: usize,
    georef: Option<(&GridTransform, f32)>,
) -> Result<()> {
    let width = u32::try_from(width)
        .map_err(|_| ExportError::invalid_geometry(format!("width {} too large", width)))?;
    let height = u32::try_from(height)
        .map_err(|_| ExportError::invalid_geometry(format!("height {} too large", height)))?;

    let mut encoder = TiffEncoder::new(writer)?;
    let mut image = encoder.new_image::<colortype::Gray32Float>(width, height)?;

    if let Some((transform, nodata)) = georef {
        let scale = [transform.pixel_width, transform.pixel_height, 0.0];
        let tiepoint = [0.0, 0.0, 0.0, transform.west, transform.north, 0.0];
        let keys = geo_keys(transform.crs);
        let nodata = format!("{}", nodata);

        let directory = image.encoder();
        directory.write_tag(Tag::ModelPixelScaleTag, &scale[..])?;
        directory.write_tag(Tag::ModelTiepointTag, &tiepoint[..])?;
        directory.write_tag(Tag::GeoKeyDirectoryTag, &keys[..])?;
        directory.write_tag(Tag::GdalNodata, nodata.as_str())?;
    }

    image.write_data(data)?;
    Ok(())
}

/// Decode a float32 single-band TIFF without looking at geotags.
pub(crate) fn decode_float_tiff<R: Read + Seek>(reader: R) -> Result<(Vec<f32>, usize, usize)> {
    let mut decoder = Decoder::new(reader)?;
    let (width, height) = decoder.dimensions()?;

    match decoder.read_image()? {
        DecodingResult::F32(data) => Ok((data, width as usize, height as usize)),
        _ => Err(ExportError::Tiff(
            "expected float32 samples".to_string(),
        )),
    }
}

/// Field values with every missing cell replaced by `fill_value`.
pub(crate) fn filled_values(field: &VariableField, fill_value: f32) -> Vec<f32> {
    field
        .values()
        .iter()
        .map(|&v| if field.is_missing(v) { fill_value } else { v })
        .collect()
}

/// GeoKeyDirectory contents: header then (key, location, count, value) entries.
fn geo_keys(crs: CrsCode) -> Vec<u16> {
    let (model_type, crs_key) = if crs.is_geographic() {
        (MODEL_TYPE_GEOGRAPHIC, KEY_GEOGRAPHIC_TYPE)
    } else {
        (MODEL_TYPE_PROJECTED, KEY_PROJECTED_CS_TYPE)
    };

    vec![
        1, 1, 0, 3,
        KEY_GT_MODEL_TYPE, 0, 1, model_type,
        KEY_GT_RASTER_TYPE, 0, 1, RASTER_PIXEL_IS_AREA,
        crs_key, 0, 1, crs.epsg(),
    ]
}

fn crs_from_geo_keys(keys: &[u16]) -> Option<CrsCode> {
    keys.get(4..)?
        .chunks_exact(4)
        .find(|entry| entry[0] == KEY_GEOGRAPHIC_TYPE || entry[0] == KEY_PROJECTED_CS_TYPE)
        .and_then(|entry| CrsCode::parse(&format!("EPSG:{}", entry[3])).ok())
}
