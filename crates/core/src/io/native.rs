//! Multi-band GeoTIFF reading/writing via the `tiff` crate
//!
//! Bands are accepted either as separate IFDs (one page per run) or as
//! interleaved samples of a single page; both layouts occur in simulation
//! archives. Georeferencing is taken from ModelPixelScaleTag +
//! ModelTiepointTag of the first page.

use crate::error::{Error, Result};
use crate::raster::{GeoTransform, RasterStack};
use ndarray::Array2;
use std::fs::File;
use std::io::{BufReader, BufWriter, Cursor, Read, Seek, Write};
use std::path::Path;
use tiff::decoder::{Decoder, DecodingResult, Limits};
use tiff::encoder::TiffEncoder;
use tiff::encoder::colortype::Gray64Float;
use tiff::tags::Tag;

const MODEL_PIXEL_SCALE: u16 = 33550;
const MODEL_TIEPOINT: u16 = 33922;
const GEO_KEY_DIRECTORY: u16 = 34735;

/// Read every band of a GeoTIFF file.
///
/// The file handle is dropped before returning, on success and on error.
pub fn read_stack<P: AsRef<Path>>(path: P) -> Result<RasterStack> {
    let file = File::open(path.as_ref())?;
    decode_stack(BufReader::new(file))
}

/// Read every band of an in-memory GeoTIFF.
pub fn read_stack_from_buffer(data: &[u8]) -> Result<RasterStack> {
    decode_stack(Cursor::new(data))
}

fn decode_stack<R: Read + Seek>(reader: R) -> Result<RasterStack> {
    let mut decoder = Decoder::new(reader)
        .map_err(|e| Error::Decode(format!("cannot open TIFF: {e}")))?
        .with_limits(Limits::unlimited());

    let (width, height) = decoder
        .dimensions()
        .map_err(|e| Error::Decode(format!("cannot read dimensions: {e}")))?;
    let rows = height as usize;
    let cols = width as usize;
    let cells = rows * cols;
    if cells == 0 {
        return Err(Error::InvalidDimensions {
            width: cols,
            height: rows,
        });
    }

    let transform = read_geotransform(&mut decoder).unwrap_or_default();
    let mut bands: Vec<Array2<f64>> = Vec::new();

    loop {
        let (w, h) = decoder
            .dimensions()
            .map_err(|e| Error::Decode(format!("cannot read dimensions: {e}")))?;
        if (h as usize, w as usize) != (rows, cols) {
            return Err(Error::SizeMismatch {
                er: rows,
                ec: cols,
                ar: h as usize,
                ac: w as usize,
            });
        }

        let image = decoder
            .read_image()
            .map_err(|e| Error::Decode(format!("cannot read image data: {e}")))?;
        let samples = to_f64(image)?;
        if samples.is_empty() || samples.len() % cells != 0 {
            return Err(Error::InvalidDimensions {
                width: cols,
                height: rows,
            });
        }

        let per_pixel = samples.len() / cells;
        for band in 0..per_pixel {
            let values: Vec<f64> = samples.iter().skip(band).step_by(per_pixel).copied().collect();
            let grid = Array2::from_shape_vec((rows, cols), values)
                .map_err(|e| Error::Other(e.to_string()))?;
            bands.push(grid);
        }

        if !decoder.more_images() {
            break;
        }
        decoder
            .next_image()
            .map_err(|e| Error::Decode(format!("cannot advance to next band: {e}")))?;
    }

    tracing::debug!(bands = bands.len(), rows, cols, "decoded raster stack");
    RasterStack::from_bands(bands, transform)
}

fn to_f64(result: DecodingResult) -> Result<Vec<f64>> {
    fn cast<T: Copy + Into<f64>>(buf: Vec<T>) -> Vec<f64> {
        buf.into_iter().map(Into::into).collect()
    }

    Ok(match result {
        DecodingResult::F64(buf) => buf,
        DecodingResult::F32(buf) => cast(buf),
        DecodingResult::U8(buf) => cast(buf),
        DecodingResult::U16(buf) => cast(buf),
        DecodingResult::U32(buf) => cast(buf),
        DecodingResult::I8(buf) => cast(buf),
        DecodingResult::I16(buf) => cast(buf),
        DecodingResult::I32(buf) => cast(buf),
        _ => {
            return Err(Error::UnsupportedDataType(
                "unsupported TIFF sample format".to_string(),
            ));
        }
    })
}

fn read_geotransform<R: Read + Seek>(decoder: &mut Decoder<R>) -> Result<GeoTransform> {
    let scale = decoder
        .get_tag_f64_vec(Tag::from_u16_exhaustive(MODEL_PIXEL_SCALE))
        .map_err(|_| Error::Decode("no pixel scale tag".into()))?;
    let tiepoint = decoder
        .get_tag_f64_vec(Tag::from_u16_exhaustive(MODEL_TIEPOINT))
        .map_err(|_| Error::Decode("no tiepoint tag".into()))?;

    if scale.len() >= 2 && tiepoint.len() >= 6 {
        // tiepoint: [I, J, K, X, Y, Z], scale: [ScaleX, ScaleY, ScaleZ]
        let origin_x = tiepoint[3] - tiepoint[0] * scale[0];
        let origin_y = tiepoint[4] + tiepoint[1] * scale[1];
        return Ok(GeoTransform::new(origin_x, origin_y, scale[0], -scale[1]));
    }

    Err(Error::Decode("cannot determine geotransform".into()))
}

/// Write a stack as a multi-page GeoTIFF (one 64-bit float page per band).
pub fn write_stack<P: AsRef<Path>>(stack: &RasterStack, path: P) -> Result<()> {
    let file = File::create(path.as_ref())?;
    let mut writer = BufWriter::new(file);
    encode_stack(stack, &mut writer)?;
    writer.flush()?;
    Ok(())
}

fn encode_stack<W: Write + Seek>(stack: &RasterStack, writer: W) -> Result<()> {
    let mut encoder =
        TiffEncoder::new(writer).map_err(|e| Error::Other(format!("TIFF encoder error: {e}")))?;

    let (rows, cols) = stack.shape();
    let gt = stack.transform();
    let scale = [gt.pixel_width, gt.pixel_height.abs(), 0.0];
    let tiepoint = [0.0, 0.0, 0.0, gt.origin_x, gt.origin_y, 0.0];
    // GeoKeyDirectory: version 1.1.0, 2 keys; projected model, pixel-is-area
    let geokeys: [u16; 12] = [1, 1, 0, 2, 1024, 0, 1, 1, 1025, 0, 1, 1];

    for band in stack.bands() {
        let data: Vec<f64> = band.iter().copied().collect();
        let mut image = encoder
            .new_image::<Gray64Float>(cols as u32, rows as u32)
            .map_err(|e| Error::Other(format!("cannot create TIFF page: {e}")))?;

        image
            .encoder()
            .write_tag(Tag::Unknown(MODEL_PIXEL_SCALE), &scale[..])
            .map_err(|e| Error::Other(format!("cannot write scale tag: {e}")))?;
        image
            .encoder()
            .write_tag(Tag::Unknown(MODEL_TIEPOINT), &tiepoint[..])
            .map_err(|e| Error::Other(format!("cannot write tiepoint tag: {e}")))?;
        image
            .encoder()
            .write_tag(Tag::Unknown(GEO_KEY_DIRECTORY), &geokeys[..])
            .map_err(|e| Error::Other(format!("cannot write geokey tag: {e}")))?;

        image
            .write_data(&data)
            .map_err(|e| Error::Other(format!("cannot write band data: {e}")))?;
    }

    Ok(())
}
