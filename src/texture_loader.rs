//! Texture file decoding.
//!
//! [`load_texture_from_file`] picks a decoder from the file extension:
//!
//! - `.dds`: layered, mipped and cubemap-aware container.
//! - `.zlib`: a zlib stream wrapping a DDS file. It is inflated in memory and
//!   decoded as DDS.
//! - anything else: a flat image decoded with the `image` crate into a single
//!   RGBA8 layer with one mip.
//!
//! Every path normalizes rows to a bottom-up order, so the first row of each
//! mip is the bottom row of the picture. Block-compressed DDS payloads are the
//! exception: flipping them would require re-encoding blocks, so they are kept
//! as stored.
//!
//! [`convert_2d_texture_to_cubemap`] turns a 4x3 cross atlas into six cube faces.

use std::{
    io::{Cursor, Read},
    path::{Path, PathBuf},
};

use ddsfile::{Caps2, D3DFormat, Dds, DxgiFormat, MiscFlag};
use glam::UVec3;

use crate::{
    image::{TextureInfo, TextureType, full_mip_chain_length},
    utils::format::{Format, FormatError, mip_extent},
};

#[derive(Debug, thiserror::Error)]
pub enum TextureLoadError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("image error: {0}")]
    Image(#[from] image::ImageError),
    #[error("dds error: {0}")]
    Dds(#[from] ddsfile::Error),
    #[error("unsupported dds pixel format")]
    UnsupportedDdsFormat,
    #[error(transparent)]
    Format(#[from] FormatError),
    #[error("cubemap conversion requires a 2D texture")]
    NotTexture2D,
    #[error("{width}x{height} is not a 4x3 atlas of square faces")]
    InvalidCubemapAtlas { width: u32, height: u32 },
    #[error("texture payload is shorter than its header describes")]
    TruncatedData,
    #[error("{mips} mip levels declared but the extent allows at most {max}")]
    TooManyMips { mips: u32, max: u32 },
}

/// All mips of one array layer (or one cube face).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LayerData {
    pub mips: Vec<Vec<u8>>,
}

/// Decoded texture contents, ready to be uploaded.
///
/// `layers[layer].mips[mip]` holds the tightly packed bytes of that subresource.
/// Cube textures store six consecutive layers per cube in the order
/// +X, -X, +Y, -Y, +Z, -Z.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TextureData {
    pub file_path: PathBuf,
    pub width: u32,
    pub height: u32,
    pub depth: u32,
    pub mip_count: u32,
    pub layer_count: u32,
    pub format: Format,
    pub ty: TextureType,
    pub layers: Vec<LayerData>,
}

impl TextureData {
    pub fn extent(&self) -> UVec3 {
        UVec3::new(self.width, self.height, self.depth)
    }

    /// Descriptor of a sampled texture able to hold this data.
    pub fn texture_info(&self, name: impl Into<String>) -> TextureInfo {
        TextureInfo {
            name: name.into(),
            ty: self.ty,
            format: self.format,
            width: self.width,
            height: self.height,
            depth: self.depth,
            layers: self.layer_count,
            mips: self.mip_count,
            ..Default::default()
        }
    }
}

/// Loads a texture, choosing the decoder from the file extension.
pub fn load_texture_from_file(path: impl AsRef<Path>) -> Result<TextureData, TextureLoadError> {
    let path = path.as_ref();
    let file_path = std::path::absolute(path)?;
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();

    let result = std::fs::read(path)
        .map_err(TextureLoadError::from)
        .and_then(|bytes| match extension.as_str() {
            "dds" => decode_dds(&bytes, file_path.clone()),
            "zlib" => decode_zlib(&bytes, file_path.clone()),
            _ => decode_flat_image(&bytes, file_path.clone()),
        });
    match &result {
        Ok(texture) => tracing::info!(
            component = "texture_loader",
            "texture file `{}` loaded: {}x{}x{}, {} layers, {} mips, {:?}",
            file_path.display(),
            texture.width,
            texture.height,
            texture.depth,
            texture.layer_count,
            texture.mip_count,
            texture.format
        ),
        Err(err) => tracing::error!(
            component = "texture_loader",
            "failed to load texture file `{}`: {err}",
            file_path.display()
        ),
    }
    result
}

/// Inflates a zlib stream and decodes the result as DDS.
pub fn decode_zlib(bytes: &[u8], file_path: PathBuf) -> Result<TextureData, TextureLoadError> {
    let mut inflated = Vec::new();
    flate2::read::ZlibDecoder::new(bytes).read_to_end(&mut inflated)?;
    decode_dds(&inflated, file_path)
}

/// Decodes any format supported by the `image` crate into one RGBA8 mip.
pub fn decode_flat_image(bytes: &[u8], file_path: PathBuf) -> Result<TextureData, TextureLoadError> {
    let image = image::ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()?
        .decode()?
        .flipv()
        .to_rgba8();
    let (width, height) = image.dimensions();
    Ok(TextureData {
        file_path,
        width,
        height,
        depth: 1,
        mip_count: 1,
        layer_count: 1,
        format: Format::R8G8B8A8_UNORM,
        ty: TextureType::Texture2D,
        layers: vec![LayerData {
            mips: vec![image.into_raw()],
        }],
    })
}

/// Decodes a DDS file held in memory.
pub fn decode_dds(bytes: &[u8], file_path: PathBuf) -> Result<TextureData, TextureLoadError> {
    let dds = Dds::read(Cursor::new(bytes))?;
    let format = dds_format(&dds)?;

    let is_cube = dds.header.caps2.contains(Caps2::CUBEMAP)
        || dds
            .header10
            .as_ref()
            .is_some_and(|h| h.misc_flag.contains(MiscFlag::TEXTURECUBE));
    let array_size = dds.header10.as_ref().map_or(1, |h| h.array_size.max(1));
    let depth = dds.get_depth().max(1);
    let (ty, layer_count) = if is_cube {
        let faces = array_size.checked_mul(6).ok_or(TextureLoadError::TruncatedData)?;
        (TextureType::TextureCube, faces)
    } else if depth > 1 {
        (TextureType::Texture3D, 1)
    } else {
        (TextureType::Texture2D, array_size)
    };
    let extent = UVec3::new(dds.get_width(), dds.get_height(), depth);
    let mip_count = dds.get_num_mipmap_levels().max(1);
    let layers = split_layers(&dds.data, format, extent, layer_count, mip_count)?;

    Ok(TextureData {
        file_path,
        width: extent.x,
        height: extent.y,
        depth: extent.z,
        mip_count,
        layer_count,
        format,
        ty,
        layers,
    })
}

/// Splits a layer-major payload into `layers x mips` subresources.
///
/// Uncompressed mips are flipped vertically, one depth slice at a time.
/// The header counts are checked against the payload length before anything
/// is allocated.
fn split_layers(
    data: &[u8],
    format: Format,
    extent: UVec3,
    layer_count: u32,
    mip_count: u32,
) -> Result<Vec<LayerData>, TextureLoadError> {
    let max = full_mip_chain_length(extent);
    if mip_count > max {
        return Err(TextureLoadError::TooManyMips {
            mips: mip_count,
            max,
        });
    }
    let mip_sizes = (0..mip_count)
        .map(|mip| format.bytes_for_extent(mip_extent(extent, mip)))
        .collect::<Result<Vec<u64>, _>>()?;
    let total = mip_sizes
        .iter()
        .try_fold(0u64, |acc, size| acc.checked_add(*size))
        .and_then(|layer| layer.checked_mul(u64::from(layer_count)));
    if total.is_none_or(|total| total > data.len() as u64) {
        return Err(TextureLoadError::TruncatedData);
    }

    let mut offset = 0usize;
    let mut layers = Vec::with_capacity(layer_count as usize);
    for _ in 0..layer_count {
        let mut mips = Vec::with_capacity(mip_sizes.len());
        for (mip, &size) in mip_sizes.iter().enumerate() {
            let mip_extent = mip_extent(extent, mip as u32);
            let size = size as usize;
            let bytes = data
                .get(offset..offset + size)
                .ok_or(TextureLoadError::TruncatedData)?;
            offset += size;

            let mut bytes = bytes.to_vec();
            if let Ok(pixel_size) = format.pixel_byte_size() {
                let row = (mip_extent.x * pixel_size) as usize;
                for slice in bytes.chunks_exact_mut(row * mip_extent.y as usize) {
                    flip_rows(slice, row);
                }
            }
            mips.push(bytes);
        }
        layers.push(LayerData { mips });
    }
    Ok(layers)
}

fn flip_rows(slice: &mut [u8], row: usize) {
    let rows = slice.len() / row;
    for i in 0..rows / 2 {
        let (top, bottom) = slice.split_at_mut((rows - i - 1) * row);
        top[i * row..(i + 1) * row].swap_with_slice(&mut bottom[..row]);
    }
}

fn dds_format(dds: &Dds) -> Result<Format, TextureLoadError> {
    if let Some(dxgi) = dds.get_dxgi_format() {
        return dxgi_format(dxgi).ok_or(TextureLoadError::UnsupportedDdsFormat);
    }
    dds.get_d3d_format()
        .and_then(d3d_format)
        .ok_or(TextureLoadError::UnsupportedDdsFormat)
}

fn dxgi_format(format: DxgiFormat) -> Option<Format> {
    Some(match format {
        DxgiFormat::R32G32B32A32_Typeless | DxgiFormat::R32G32B32A32_Float => {
            Format::R32G32B32A32_SFLOAT
        }
        DxgiFormat::R32G32B32A32_UInt => Format::R32G32B32A32_UINT,
        DxgiFormat::R32G32B32A32_SInt => Format::R32G32B32A32_SINT,
        DxgiFormat::R32G32B32_Typeless | DxgiFormat::R32G32B32_Float => Format::R32G32B32_SFLOAT,
        DxgiFormat::R32G32B32_UInt => Format::R32G32B32_UINT,
        DxgiFormat::R32G32B32_SInt => Format::R32G32B32_SINT,
        DxgiFormat::R16G16B16A16_Typeless | DxgiFormat::R16G16B16A16_Float => {
            Format::R16G16B16A16_SFLOAT
        }
        DxgiFormat::R16G16B16A16_UNorm => Format::R16G16B16A16_UNORM,
        DxgiFormat::R16G16B16A16_UInt => Format::R16G16B16A16_UINT,
        DxgiFormat::R16G16B16A16_SNorm => Format::R16G16B16A16_SNORM,
        DxgiFormat::R16G16B16A16_SInt => Format::R16G16B16A16_SINT,
        DxgiFormat::R32G32_Typeless | DxgiFormat::R32G32_Float => Format::R32G32_SFLOAT,
        DxgiFormat::R32G32_UInt => Format::R32G32_UINT,
        DxgiFormat::R32G32_SInt => Format::R32G32_SINT,
        DxgiFormat::R10G10B10A2_Typeless | DxgiFormat::R10G10B10A2_UNorm => {
            Format::A2B10G10R10_UNORM_PACK32
        }
        DxgiFormat::R10G10B10A2_UInt => Format::A2B10G10R10_UINT_PACK32,
        DxgiFormat::R11G11B10_Float => Format::B10G11R11_UFLOAT_PACK32,
        DxgiFormat::R8G8B8A8_Typeless | DxgiFormat::R8G8B8A8_UNorm => Format::R8G8B8A8_UNORM,
        DxgiFormat::R8G8B8A8_UNorm_sRGB => Format::R8G8B8A8_SRGB,
        DxgiFormat::R8G8B8A8_UInt => Format::R8G8B8A8_UINT,
        DxgiFormat::R8G8B8A8_SNorm => Format::R8G8B8A8_SNORM,
        DxgiFormat::R8G8B8A8_SInt => Format::R8G8B8A8_SINT,
        DxgiFormat::R16G16_Typeless | DxgiFormat::R16G16_Float => Format::R16G16_SFLOAT,
        DxgiFormat::R16G16_UNorm => Format::R16G16_UNORM,
        DxgiFormat::R16G16_UInt => Format::R16G16_UINT,
        DxgiFormat::R16G16_SNorm => Format::R16G16_SNORM,
        DxgiFormat::R16G16_SInt => Format::R16G16_SINT,
        DxgiFormat::R32_Typeless | DxgiFormat::R32_Float => Format::R32_SFLOAT,
        DxgiFormat::D32_Float => Format::D32_SFLOAT,
        DxgiFormat::R32_UInt => Format::R32_UINT,
        DxgiFormat::R32_SInt => Format::R32_SINT,
        DxgiFormat::R24G8_Typeless | DxgiFormat::D24_UNorm_S8_UInt => Format::D24_UNORM_S8_UINT,
        DxgiFormat::R24_UNorm_X8_Typeless => Format::X8_D24_UNORM_PACK32,
        DxgiFormat::R8G8_Typeless | DxgiFormat::R8G8_UNorm => Format::R8G8_UNORM,
        DxgiFormat::R8G8_UInt => Format::R8G8_UINT,
        DxgiFormat::R8G8_SNorm => Format::R8G8_SNORM,
        DxgiFormat::R8G8_SInt => Format::R8G8_SINT,
        DxgiFormat::R16_Typeless | DxgiFormat::R16_Float => Format::R16_SFLOAT,
        DxgiFormat::D16_UNorm => Format::D16_UNORM,
        DxgiFormat::R16_UNorm => Format::R16_UNORM,
        DxgiFormat::R16_UInt => Format::R16_UINT,
        DxgiFormat::R16_SNorm => Format::R16_SNORM,
        DxgiFormat::R16_SInt => Format::R16_SINT,
        DxgiFormat::R8_Typeless | DxgiFormat::R8_UNorm => Format::R8_UNORM,
        DxgiFormat::R8_UInt => Format::R8_UINT,
        DxgiFormat::R8_SNorm => Format::R8_SNORM,
        DxgiFormat::R8_SInt => Format::R8_SINT,
        DxgiFormat::R9G9B9E5_SharedExp => Format::E5B9G9R9_UFLOAT_PACK32,
        DxgiFormat::B5G6R5_UNorm => Format::R5G6B5_UNORM_PACK16,
        DxgiFormat::B5G5R5A1_UNorm => Format::A1R5G5B5_UNORM_PACK16,
        DxgiFormat::B8G8R8A8_Typeless | DxgiFormat::B8G8R8A8_UNorm => Format::B8G8R8A8_UNORM,
        DxgiFormat::B8G8R8A8_UNorm_sRGB => Format::B8G8R8A8_SRGB,
        DxgiFormat::BC1_Typeless | DxgiFormat::BC1_UNorm => Format::BC1_RGBA_UNORM_BLOCK,
        DxgiFormat::BC1_UNorm_sRGB => Format::BC1_RGBA_SRGB_BLOCK,
        DxgiFormat::BC2_Typeless | DxgiFormat::BC2_UNorm => Format::BC2_UNORM_BLOCK,
        DxgiFormat::BC2_UNorm_sRGB => Format::BC2_SRGB_BLOCK,
        DxgiFormat::BC3_Typeless | DxgiFormat::BC3_UNorm => Format::BC3_UNORM_BLOCK,
        DxgiFormat::BC3_UNorm_sRGB => Format::BC3_SRGB_BLOCK,
        DxgiFormat::BC4_Typeless | DxgiFormat::BC4_UNorm => Format::BC4_UNORM_BLOCK,
        DxgiFormat::BC4_SNorm => Format::BC4_SNORM_BLOCK,
        DxgiFormat::BC5_Typeless | DxgiFormat::BC5_UNorm => Format::BC5_UNORM_BLOCK,
        DxgiFormat::BC5_SNorm => Format::BC5_SNORM_BLOCK,
        DxgiFormat::BC6H_Typeless | DxgiFormat::BC6H_UF16 => Format::BC6H_UFLOAT_BLOCK,
        DxgiFormat::BC6H_SF16 => Format::BC6H_SFLOAT_BLOCK,
        DxgiFormat::BC7_Typeless | DxgiFormat::BC7_UNorm => Format::BC7_UNORM_BLOCK,
        DxgiFormat::BC7_UNorm_sRGB => Format::BC7_SRGB_BLOCK,
        _ => return None,
    })
}

/// Legacy pixel formats from headers without the DX10 extension.
fn d3d_format(format: D3DFormat) -> Option<Format> {
    Some(match format {
        D3DFormat::A8R8G8B8 | D3DFormat::X8R8G8B8 => Format::B8G8R8A8_UNORM,
        D3DFormat::A8B8G8R8 | D3DFormat::X8B8G8R8 => Format::R8G8B8A8_UNORM,
        D3DFormat::A2B10G10R10 => Format::A2B10G10R10_UNORM_PACK32,
        D3DFormat::A2R10G10B10 => Format::A2R10G10B10_UNORM_PACK32,
        D3DFormat::G16R16 => Format::R16G16_UNORM,
        D3DFormat::A16B16G16R16 => Format::R16G16B16A16_UNORM,
        D3DFormat::R5G6B5 => Format::R5G6B5_UNORM_PACK16,
        D3DFormat::A1R5G5B5 => Format::A1R5G5B5_UNORM_PACK16,
        D3DFormat::L8 => Format::R8_UNORM,
        D3DFormat::A8L8 => Format::R8G8_UNORM,
        D3DFormat::L16 => Format::R16_UNORM,
        D3DFormat::R16F => Format::R16_SFLOAT,
        D3DFormat::G16R16F => Format::R16G16_SFLOAT,
        D3DFormat::A16B16G16R16F => Format::R16G16B16A16_SFLOAT,
        D3DFormat::R32F => Format::R32_SFLOAT,
        D3DFormat::G32R32F => Format::R32G32_SFLOAT,
        D3DFormat::A32B32G32R32F => Format::R32G32B32A32_SFLOAT,
        D3DFormat::DXT1 => Format::BC1_RGBA_UNORM_BLOCK,
        D3DFormat::DXT2 | D3DFormat::DXT3 => Format::BC2_UNORM_BLOCK,
        D3DFormat::DXT4 | D3DFormat::DXT5 => Format::BC3_UNORM_BLOCK,
        _ => return None,
    })
}

/// Atlas cell of each cube face, in face order +X, -X, +Y, -Y, +Z, -Z.
///
/// Rows count from the bottom of the atlas, matching the bottom-up row order
/// of decoded textures.
const CUBEMAP_FACE_CELLS: [(u32, u32); 6] = [(2, 1), (0, 1), (1, 2), (1, 0), (1, 1), (3, 1)];

/// Converts a 2D texture laid out as a 4x3 cross atlas into a cube texture.
///
/// Every source layer becomes six consecutive cube faces, every mip is
/// extracted separately.
pub fn convert_2d_texture_to_cubemap(texture: &TextureData) -> Result<TextureData, TextureLoadError> {
    if texture.ty != TextureType::Texture2D {
        return Err(TextureLoadError::NotTexture2D);
    }
    let face_width = texture.width / 4;
    let face_height = texture.height / 3;
    if face_width == 0 || face_width != face_height {
        return Err(TextureLoadError::InvalidCubemapAtlas {
            width: texture.width,
            height: texture.height,
        });
    }
    let pixel_size = texture.format.pixel_byte_size()?;
    let max = full_mip_chain_length(UVec3::new(face_width, face_height, 1));
    let mips = texture
        .layers
        .iter()
        .map(|layer| layer.mips.len() as u32)
        .chain(std::iter::once(texture.mip_count))
        .max()
        .unwrap_or(0);
    if mips > max {
        return Err(TextureLoadError::TooManyMips { mips, max });
    }

    let mut layers = Vec::with_capacity(texture.layers.len() * 6);
    for layer in &texture.layers {
        let mut faces = vec![LayerData::default(); 6];
        for (mip, bytes) in layer.mips.iter().enumerate() {
            let size = face_width.checked_shr(mip as u32).unwrap_or(0).max(1);
            for (face, &(cell_x, cell_y)) in faces.iter_mut().zip(CUBEMAP_FACE_CELLS.iter()) {
                face.mips.push(extract_cubemap_face(
                    bytes, size, size, pixel_size, cell_x, cell_y,
                )?);
            }
        }
        layers.extend(faces);
    }

    Ok(TextureData {
        file_path: texture.file_path.clone(),
        width: face_width,
        height: face_height,
        depth: texture.depth,
        mip_count: texture.mip_count,
        layer_count: texture.layer_count * 6,
        format: texture.format,
        ty: TextureType::TextureCube,
        layers,
    })
}

/// Copies one `face_width x face_height` cell out of a 4-cell-wide atlas.
///
/// Rows are read bottom-up, so the output is vertically flipped relative to
/// the atlas.
pub fn extract_cubemap_face(
    bytes: &[u8],
    face_width: u32,
    face_height: u32,
    pixel_size: u32,
    cell_x: u32,
    cell_y: u32,
) -> Result<Vec<u8>, TextureLoadError> {
    let source_width = face_width as usize * 4;
    let row_bytes = (face_width * pixel_size) as usize;
    let pixel_size = pixel_size as usize;
    let mut face = Vec::with_capacity(row_bytes * face_height as usize);
    for i in 0..face_height {
        let y = ((face_height - i - 1) + cell_y * face_height) as usize;
        let x = (cell_x * face_width) as usize;
        let start = (y * source_width + x) * pixel_size;
        let row = bytes
            .get(start..start + row_bytes)
            .ok_or(TextureLoadError::TruncatedData)?;
        face.extend_from_slice(row);
    }
    Ok(face)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    /// Builds a single-channel atlas where every pixel stores `cell_x + 4 * cell_y`
    /// in the high nibble and its row inside the cell in the low nibble.
    fn atlas(face: u32) -> TextureData {
        let (width, height) = (face * 4, face * 3);
        let mut bytes = Vec::with_capacity((width * height) as usize);
        for y in 0..height {
            for x in 0..width {
                let cell = (x / face) + 4 * (y / face);
                bytes.push(((cell << 4) | (y % face)) as u8);
            }
        }
        TextureData {
            file_path: PathBuf::from("atlas.png"),
            width,
            height,
            depth: 1,
            mip_count: 1,
            layer_count: 1,
            format: Format::R8_UNORM,
            ty: TextureType::Texture2D,
            layers: vec![LayerData { mips: vec![bytes] }],
        }
    }

    #[test]
    fn test_cubemap_dimensions() {
        let cube = convert_2d_texture_to_cubemap(&atlas(4)).unwrap();
        assert_eq!((cube.width, cube.height), (4, 4), "faces are W/4 x H/3");
        assert_eq!(cube.ty, TextureType::TextureCube);
        assert_eq!(cube.layer_count, 6);
        assert_eq!(cube.layers.len(), 6);
        for face in &cube.layers {
            assert_eq!(face.mips.len(), 1);
            assert_eq!(face.mips[0].len(), 16);
        }
    }

    #[test]
    fn test_cubemap_face_cells() {
        let cube = convert_2d_texture_to_cubemap(&atlas(2)).unwrap();
        let cells: Vec<u8> = cube.layers.iter().map(|face| face.mips[0][0] >> 4).collect();
        // (2,1) (0,1) (1,2) (1,0) (1,1) (3,1)
        assert_eq!(cells, vec![6, 4, 9, 1, 5, 7]);
    }

    #[test]
    fn test_cubemap_face_rows_are_flipped() {
        let texture = atlas(3);
        let face = extract_cubemap_face(&texture.layers[0].mips[0], 3, 3, 1, 1, 1).unwrap();
        let rows: Vec<u8> = face.chunks(3).map(|row| row[0] & 0xF).collect();
        assert_eq!(rows, vec![2, 1, 0], "source rows are read bottom-up");
    }

    #[test]
    fn test_cubemap_extraction_is_deterministic() {
        let texture = atlas(4);
        let first = convert_2d_texture_to_cubemap(&texture).unwrap();
        let second = convert_2d_texture_to_cubemap(&texture).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_cubemap_rejects_bad_input() {
        let mut texture = atlas(4);
        texture.width = 20;
        assert!(matches!(
            convert_2d_texture_to_cubemap(&texture),
            Err(TextureLoadError::InvalidCubemapAtlas { width: 20, height: 12 })
        ));

        let mut texture = atlas(4);
        texture.ty = TextureType::Texture3D;
        assert!(matches!(
            convert_2d_texture_to_cubemap(&texture),
            Err(TextureLoadError::NotTexture2D)
        ));

        let mut texture = atlas(4);
        texture.format = Format::BC3_UNORM_BLOCK;
        assert!(matches!(
            convert_2d_texture_to_cubemap(&texture),
            Err(TextureLoadError::Format(FormatError::BlockCompressed(_)))
        ));

        let mut texture = atlas(4);
        texture.layers[0].mips[0].truncate(10);
        assert!(matches!(
            convert_2d_texture_to_cubemap(&texture),
            Err(TextureLoadError::TruncatedData)
        ));
    }

    #[test]
    fn test_split_layers_flips_uncompressed() {
        // 2x2 R8 base mip followed by a 1x1 mip, two layers.
        let data = [0, 1, 2, 3, 4, 10, 11, 12, 13, 14];
        let layers = split_layers(&data, Format::R8_UNORM, UVec3::new(2, 2, 1), 2, 2).unwrap();
        assert_eq!(layers.len(), 2);
        assert_eq!(layers[0].mips, vec![vec![2, 3, 0, 1], vec![4]]);
        assert_eq!(layers[1].mips, vec![vec![12, 13, 10, 11], vec![14]]);
    }

    #[test]
    fn test_split_layers_keeps_compressed() {
        // 8x8 BC1 is 2x2 blocks of 8 bytes, the 4x4 mip is one block.
        let data: Vec<u8> = (0..40).collect();
        let layers =
            split_layers(&data, Format::BC1_RGBA_UNORM_BLOCK, UVec3::new(8, 8, 1), 1, 2).unwrap();
        assert_eq!(layers[0].mips[0], data[..32].to_vec(), "block data is not flipped");
        assert_eq!(layers[0].mips[1], data[32..].to_vec());
    }

    #[test]
    fn test_split_layers_truncated() {
        let data = [0u8; 15];
        assert!(matches!(
            split_layers(&data, Format::R8G8B8A8_UNORM, UVec3::new(2, 2, 1), 1, 1),
            Err(TextureLoadError::TruncatedData)
        ));
    }

    #[test]
    fn test_split_layers_flips_each_depth_slice() {
        let data = [0, 1, 2, 3];
        let layers = split_layers(&data, Format::R8_UNORM, UVec3::new(1, 2, 2), 1, 1).unwrap();
        assert_eq!(layers[0].mips[0], vec![1, 0, 3, 2]);
    }

    fn dxgi_dds(format: DxgiFormat, width: u32, height: u32, mips: u32) -> Dds {
        Dds::new_dxgi(ddsfile::NewDxgiParams {
            height,
            width,
            depth: None,
            format,
            mipmap_levels: Some(mips),
            array_layers: None,
            caps2: None,
            is_cubemap: false,
            resource_dimension: ddsfile::D3D10ResourceDimension::Texture2D,
            alpha_mode: ddsfile::AlphaMode::Straight,
        })
        .unwrap()
    }

    fn write_dds(dds: &Dds) -> Vec<u8> {
        let mut bytes = Vec::new();
        dds.write(&mut bytes).unwrap();
        bytes
    }

    fn rgba_dds(width: u32, height: u32, mips: u32) -> Vec<u8> {
        let mut dds = Dds::new_dxgi(ddsfile::NewDxgiParams {
            height,
            width,
            depth: None,
            format: DxgiFormat::R8G8B8A8_UNorm,
            mipmap_levels: Some(mips),
            array_layers: None,
            caps2: None,
            is_cubemap: false,
            resource_dimension: ddsfile::D3D10ResourceDimension::Texture2D,
            alpha_mode: ddsfile::AlphaMode::Straight,
        })
        .unwrap();
        for (i, byte) in dds.data.iter_mut().enumerate() {
            *byte = i as u8;
        }
        let mut bytes = Vec::new();
        dds.write(&mut bytes).unwrap();
        bytes
    }

    #[test]
    fn test_decode_dds() {
        let bytes = rgba_dds(4, 2, 3);
        let texture = decode_dds(&bytes, PathBuf::from("/textures/a.dds")).unwrap();
        assert_eq!(texture.format, Format::R8G8B8A8_UNORM);
        assert_eq!(texture.ty, TextureType::Texture2D);
        assert_eq!((texture.width, texture.height, texture.depth), (4, 2, 1));
        assert_eq!(texture.mip_count, 3);
        assert_eq!(texture.layer_count, 1);
        let sizes: Vec<usize> = texture.layers[0].mips.iter().map(Vec::len).collect();
        assert_eq!(sizes, vec![32, 8, 4]);
        assert_eq!(
            texture.layers[0].mips[0][..4],
            [16, 17, 18, 19],
            "the second row comes first after flipping"
        );
    }

    #[test]
    fn test_decode_dds_rejects_huge_cube_array() {
        let mut dds = dxgi_dds(DxgiFormat::R8G8B8A8_UNorm, 2, 2, 1);
        let header10 = dds.header10.as_mut().unwrap();
        header10.misc_flag.insert(MiscFlag::TEXTURECUBE);
        header10.array_size = 0x3000_0000;
        assert!(
            matches!(
                decode_dds(&write_dds(&dds), PathBuf::new()),
                Err(TextureLoadError::TruncatedData)
            ),
            "face count overflowing u32 must be an error"
        );

        dds.header10.as_mut().unwrap().array_size = 0x1000_0000;
        assert!(
            matches!(
                decode_dds(&write_dds(&dds), PathBuf::new()),
                Err(TextureLoadError::TruncatedData)
            ),
            "layer count larger than the payload must be an error"
        );
    }

    #[test]
    fn test_decode_dds_rejects_too_many_mips() {
        let dds = dxgi_dds(DxgiFormat::R8_UNorm, 1, 1, 40);
        assert!(
            matches!(
                decode_dds(&write_dds(&dds), PathBuf::new()),
                Err(TextureLoadError::TooManyMips { mips: 40, max: 1 })
            ),
            "a 1x1 texture has a single mip"
        );
    }

    #[test]
    fn test_split_layers_checks_size_before_allocating() {
        let data = [0u8; 16];
        assert!(matches!(
            split_layers(&data, Format::R8_UNORM, UVec3::new(2, 2, 1), u32::MAX, 1),
            Err(TextureLoadError::TruncatedData)
        ));
        assert!(matches!(
            split_layers(&data, Format::R8_UNORM, UVec3::new(2, 2, 1), 1, 33),
            Err(TextureLoadError::TooManyMips { mips: 33, max: 2 })
        ));
    }

    #[test]
    fn test_cubemap_rejects_too_many_mips() {
        let mut texture = atlas(4);
        let base = texture.layers[0].mips[0].clone();
        texture.layers[0].mips.extend(std::iter::repeat_n(base, 39));
        texture.mip_count = 40;
        assert!(matches!(
            convert_2d_texture_to_cubemap(&texture),
            Err(TextureLoadError::TooManyMips { mips: 40, max: 3 })
        ));
    }

    #[test]
    fn test_decode_zlib() {
        let dds = rgba_dds(2, 2, 1);
        let mut encoder = flate2::write::ZlibEncoder::new(Vec::new(), flate2::Compression::default());
        encoder.write_all(&dds).unwrap();
        let compressed = encoder.finish().unwrap();

        let from_zlib = decode_zlib(&compressed, PathBuf::from("a.zlib")).unwrap();
        let from_dds = decode_dds(&dds, PathBuf::from("a.zlib")).unwrap();
        assert_eq!(from_zlib, from_dds);
    }

    #[test]
    fn test_decode_flat_image() {
        let pixels: Vec<u8> = (0..2 * 2 * 4).collect();
        let image = image::RgbaImage::from_raw(2, 2, pixels).unwrap();
        let mut png = Cursor::new(Vec::new());
        image.write_to(&mut png, image::ImageFormat::Png).unwrap();

        let texture = decode_flat_image(png.get_ref(), PathBuf::from("a.png")).unwrap();
        assert_eq!(texture.format, Format::R8G8B8A8_UNORM);
        assert_eq!((texture.width, texture.height), (2, 2));
        assert_eq!(texture.layers.len(), 1);
        assert_eq!(
            texture.layers[0].mips[0],
            vec![8, 9, 10, 11, 12, 13, 14, 15, 0, 1, 2, 3, 4, 5, 6, 7],
            "rows are flipped"
        );
    }

    #[test]
    fn test_decode_garbage() {
        assert!(matches!(
            decode_dds(b"not a dds file", PathBuf::new()),
            Err(TextureLoadError::Dds(_) | TextureLoadError::Io(_))
        ));
        assert!(decode_zlib(b"garbage", PathBuf::new()).is_err());
        assert!(matches!(
            decode_flat_image(b"garbage", PathBuf::new()),
            Err(TextureLoadError::Image(_))
        ));
    }

    #[test]
    fn test_texture_info_from_data() {
        let cube = convert_2d_texture_to_cubemap(&atlas(4)).unwrap();
        let info = cube.texture_info("sky");
        assert_eq!(info.name, "sky");
        assert_eq!(info.ty, TextureType::TextureCube);
        assert_eq!(info.layers, 6);
        assert!(info.validate().is_ok());
    }
}
