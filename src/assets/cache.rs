//! Binary asset cache.
//!
//! A versionless sequential dump that lets a converted asset skip the import
//! pipeline on the next run:
//!
//! - scalars: little-endian `u32` / `i32` / `f32`
//! - strings: `u32` byte length, then UTF-8 bytes
//! - POD arrays: `u32` element count, then a flat copy of the elements as
//!   little-endian 4-byte words
//!
//! Loading reproduces every stored numeric field bit for bit. Only derived
//! state is rebuilt: bone child lists, processing order, the pose cache and
//! the renderer buffers.

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;
use std::sync::Arc;

use bytemuck::Pod;
use glam::Mat4;
use smallvec::SmallVec;

use crate::animation::{AnimationClip, AnimationLibrary, BoneAnimationTrack};
use crate::errors::{Result, SinewError};
use crate::render::vertex::SkeletalVertex;
use crate::resources::geometry::BoundingBox;
use crate::resources::mesh::{MaterialSubset, MeshAsset, MeshGeometry, SkinnedMesh, StaticMesh};
use crate::scene::{BoneNode, Skeleton};

/// Sequential writer over any byte sink.
pub struct CacheWriter<W: Write> {
    inner: W,
}

impl<W: Write> CacheWriter<W> {
    pub fn new(inner: W) -> Self {
        Self { inner }
    }

    pub fn into_inner(self) -> W {
        self.inner
    }

    pub fn write_u32(&mut self, value: u32) -> Result<()> {
        self.inner.write_all(&value.to_le_bytes())?;
        Ok(())
    }

    pub fn write_i32(&mut self, value: i32) -> Result<()> {
        self.inner.write_all(&value.to_le_bytes())?;
        Ok(())
    }

    pub fn write_f32(&mut self, value: f32) -> Result<()> {
        self.inner.write_all(&value.to_le_bytes())?;
        Ok(())
    }

    pub fn write_len(&mut self, len: usize) -> Result<()> {
        let len = u32::try_from(len)
            .map_err(|_| SinewError::CacheCorrupt(format!("length {len} does not fit in u32")))?;
        self.write_u32(len)
    }

    pub fn write_str(&mut self, value: &str) -> Result<()> {
        self.write_len(value.len())?;
        self.inner.write_all(value.as_bytes())?;
        Ok(())
    }

    fn write_words(&mut self, bytes: &[u8]) -> Result<()> {
        if cfg!(target_endian = "little") {
            self.inner.write_all(bytes)?;
        } else {
            let mut swapped = bytes.to_vec();
            swap_words(&mut swapped);
            self.inner.write_all(&swapped)?;
        }
        Ok(())
    }

    /// One POD value, no prefix.
    pub fn write_pod<T: Pod>(&mut self, value: &T) -> Result<()> {
        debug_assert_eq!(size_of::<T>() % 4, 0);
        self.write_words(bytemuck::bytes_of(value))
    }

    /// Count-prefixed flat copy.
    pub fn write_slice<T: Pod>(&mut self, values: &[T]) -> Result<()> {
        debug_assert_eq!(size_of::<T>() % 4, 0);
        self.write_len(values.len())?;
        self.write_words(bytemuck::cast_slice(values))
    }

    pub fn write_strings(&mut self, values: &[String]) -> Result<()> {
        self.write_len(values.len())?;
        for value in values {
            self.write_str(value)?;
        }
        Ok(())
    }

    pub fn write_items<T: CacheSerialize>(&mut self, items: &[T]) -> Result<()> {
        self.write_len(items.len())?;
        for item in items {
            item.write_to(self)?;
        }
        Ok(())
    }

    pub fn flush(&mut self) -> Result<()> {
        self.inner.flush()?;
        Ok(())
    }
}

/// Cached POD types are made of 4-byte scalars. Big-endian hosts swap each
/// word so arrays share the scalars' little-endian layout.
fn swap_words(bytes: &mut [u8]) {
    if cfg!(target_endian = "big") {
        for word in bytes.chunks_exact_mut(4) {
            word.reverse();
        }
    }
}

/// Sequential reader matching [`CacheWriter`].
pub struct CacheReader<R: Read> {
    inner: R,
}

impl<R: Read> CacheReader<R> {
    pub fn new(inner: R) -> Self {
        Self { inner }
    }

    fn read_array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let mut buf = [0u8; N];
        self.inner.read_exact(&mut buf)?;
        Ok(buf)
    }

    /// Reads exactly `len` bytes without trusting `len` for the allocation.
    fn read_bytes(&mut self, len: usize) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        (&mut self.inner).take(len as u64).read_to_end(&mut buf)?;
        if buf.len() != len {
            return Err(SinewError::CacheCorrupt(format!(
                "expected {len} bytes, found {}",
                buf.len()
            )));
        }
        Ok(buf)
    }

    pub fn read_u32(&mut self) -> Result<u32> {
        Ok(u32::from_le_bytes(self.read_array()?))
    }

    pub fn read_i32(&mut self) -> Result<i32> {
        Ok(i32::from_le_bytes(self.read_array()?))
    }

    pub fn read_f32(&mut self) -> Result<f32> {
        Ok(f32::from_le_bytes(self.read_array()?))
    }

    pub fn read_len(&mut self) -> Result<usize> {
        Ok(self.read_u32()? as usize)
    }

    pub fn read_string(&mut self) -> Result<String> {
        let len = self.read_len()?;
        Ok(String::from_utf8(self.read_bytes(len)?)?)
    }

    pub fn read_pod<T: Pod>(&mut self) -> Result<T> {
        let mut bytes = self.read_bytes(size_of::<T>())?;
        swap_words(&mut bytes);
        Ok(bytemuck::pod_read_unaligned(&bytes))
    }

    pub fn read_vec<T: Pod>(&mut self) -> Result<Vec<T>> {
        let count = self.read_len()?;
        let len = count
            .checked_mul(size_of::<T>())
            .ok_or_else(|| SinewError::CacheCorrupt(format!("array of {count} elements overflows")))?;
        let mut bytes = self.read_bytes(len)?;
        swap_words(&mut bytes);
        Ok(bytemuck::pod_collect_to_vec::<u8, T>(&bytes))
    }

    pub fn read_strings(&mut self) -> Result<Vec<String>> {
        let count = self.read_len()?;
        let mut out = Vec::new();
        for _ in 0..count {
            out.push(self.read_string()?);
        }
        Ok(out)
    }

    pub fn read_items<T: CacheSerialize>(&mut self) -> Result<Vec<T>> {
        let count = self.read_len()?;
        let mut out = Vec::new();
        for _ in 0..count {
            out.push(T::read_from(self)?);
        }
        Ok(out)
    }
}

/// Types with a binary cache encoding.
pub trait CacheSerialize: Sized {
    fn write_to<W: Write>(&self, writer: &mut CacheWriter<W>) -> Result<()>;
    fn read_from<R: Read>(reader: &mut CacheReader<R>) -> Result<Self>;
}

pub fn save_to_path<T: CacheSerialize>(value: &T, path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    let mut writer = CacheWriter::new(BufWriter::new(File::create(path)?));
    value.write_to(&mut writer)?;
    writer.flush()?;
    log::debug!("Wrote cache {}", path.display());
    Ok(())
}

pub fn load_from_path<T: CacheSerialize>(path: impl AsRef<Path>) -> Result<T> {
    let path = path.as_ref();
    let mut reader = CacheReader::new(BufReader::new(File::open(path)?));
    let value = T::read_from(&mut reader)?;
    log::debug!("Loaded cache {}", path.display());
    Ok(value)
}

// ============================================================================
// Skeleton
// ============================================================================

impl CacheSerialize for Skeleton {
    fn write_to<W: Write>(&self, writer: &mut CacheWriter<W>) -> Result<()> {
        writer.write_str(&self.name)?;
        writer.write_len(self.bones.len())?;
        for (index, bone) in self.bones.iter().enumerate() {
            writer.write_str(&bone.name)?;
            let parent = match bone.parent {
                Some(p) => i32::try_from(p)
                    .map_err(|_| SinewError::CacheCorrupt(format!("parent index {p} out of range")))?,
                None => -1,
            };
            writer.write_i32(parent)?;
            writer.write_pod(&bone.bind_transform)?;
            writer.write_pod(&bone.inverse_bind_transform)?;
            writer.write_pod(&bone.geometry_offset)?;
            writer.write_pod(&self.ref_bone_pose(index))?;
        }
        Ok(())
    }

    fn read_from<R: Read>(reader: &mut CacheReader<R>) -> Result<Self> {
        let name = reader.read_string()?;
        let count = reader.read_len()?;
        let mut bones = Vec::new();
        let mut ref_bone_pose = Vec::new();
        for index in 0..count {
            let bone_name = reader.read_string()?;
            let parent = match reader.read_i32()? {
                -1 => None,
                p if p >= 0 && (p as usize) < index => Some(p as usize),
                p => {
                    return Err(SinewError::CacheCorrupt(format!(
                        "bone '{bone_name}' has parent {p}, expected an earlier bone"
                    )));
                }
            };
            bones.push(BoneNode {
                name: bone_name,
                parent,
                bind_transform: reader.read_pod::<Mat4>()?,
                inverse_bind_transform: reader.read_pod::<Mat4>()?,
                geometry_offset: reader.read_pod::<Mat4>()?,
                children: SmallVec::new(),
            });
            ref_bone_pose.push(reader.read_pod::<Mat4>()?);
        }
        Skeleton::from_parts(&name, bones, ref_bone_pose)
    }
}

// ============================================================================
// Meshes
// ============================================================================

impl CacheSerialize for MaterialSubset {
    fn write_to<W: Write>(&self, writer: &mut CacheWriter<W>) -> Result<()> {
        writer.write_pod(self)
    }

    fn read_from<R: Read>(reader: &mut CacheReader<R>) -> Result<Self> {
        reader.read_pod()
    }
}

impl CacheSerialize for MeshGeometry {
    fn write_to<W: Write>(&self, writer: &mut CacheWriter<W>) -> Result<()> {
        writer.write_str(&self.name)?;
        writer.write_slice(&self.vertices)?;
        writer.write_slice(&self.indices)?;
        writer.write_items(&self.subsets)?;
        writer.write_strings(&self.material_names)?;
        writer.write_pod(&self.bounds)
    }

    fn read_from<R: Read>(reader: &mut CacheReader<R>) -> Result<Self> {
        let geometry = MeshGeometry {
            name: reader.read_string()?,
            vertices: reader.read_vec::<SkeletalVertex>()?,
            indices: reader.read_vec::<u32>()?,
            subsets: reader.read_items::<MaterialSubset>()?,
            material_names: reader.read_strings()?,
            bounds: reader.read_pod::<BoundingBox>()?,
        };

        let vertex_count = geometry.vertices.len();
        if let Some(&bad) = geometry.indices.iter().find(|&&i| i as usize >= vertex_count) {
            return Err(SinewError::CacheCorrupt(format!(
                "mesh '{}' index {bad} exceeds {vertex_count} vertices",
                geometry.name
            )));
        }
        Ok(geometry)
    }
}

impl CacheSerialize for SkinnedMesh {
    fn write_to<W: Write>(&self, writer: &mut CacheWriter<W>) -> Result<()> {
        self.geometry.write_to(writer)?;
        self.skeleton.write_to(writer)
    }

    fn read_from<R: Read>(reader: &mut CacheReader<R>) -> Result<Self> {
        let geometry = MeshGeometry::read_from(reader)?;
        let skeleton = Skeleton::read_from(reader)?;
        Ok(SkinnedMesh::new(geometry, skeleton))
    }
}

const MESH_TAG_STATIC: u32 = 0;
const MESH_TAG_SKINNED: u32 = 1;

impl CacheSerialize for MeshAsset {
    fn write_to<W: Write>(&self, writer: &mut CacheWriter<W>) -> Result<()> {
        match self {
            MeshAsset::Static(mesh) => {
                writer.write_u32(MESH_TAG_STATIC)?;
                mesh.geometry.write_to(writer)
            }
            MeshAsset::Skinned(mesh) => {
                writer.write_u32(MESH_TAG_SKINNED)?;
                mesh.write_to(writer)
            }
        }
    }

    fn read_from<R: Read>(reader: &mut CacheReader<R>) -> Result<Self> {
        match reader.read_u32()? {
            MESH_TAG_STATIC => Ok(MeshAsset::Static(StaticMesh::new(MeshGeometry::read_from(reader)?))),
            MESH_TAG_SKINNED => Ok(MeshAsset::Skinned(SkinnedMesh::read_from(reader)?)),
            tag => Err(SinewError::CacheCorrupt(format!("unknown mesh tag {tag}"))),
        }
    }
}

// ============================================================================
// Animation
// ============================================================================

impl CacheSerialize for BoneAnimationTrack {
    fn write_to<W: Write>(&self, writer: &mut CacheWriter<W>) -> Result<()> {
        writer.write_str(&self.bone_name)?;
        writer.write_slice(&self.positions)?;
        writer.write_slice(&self.rotations)?;
        writer.write_slice(&self.scales)
    }

    fn read_from<R: Read>(reader: &mut CacheReader<R>) -> Result<Self> {
        Ok(BoneAnimationTrack {
            bone_name: reader.read_string()?,
            positions: reader.read_vec()?,
            rotations: reader.read_vec()?,
            scales: reader.read_vec()?,
        })
    }
}

impl CacheSerialize for AnimationClip {
    fn write_to<W: Write>(&self, writer: &mut CacheWriter<W>) -> Result<()> {
        writer.write_str(&self.name)?;
        writer.write_f32(self.frame_rate)?;
        writer.write_items(&self.tracks)
    }

    fn read_from<R: Read>(reader: &mut CacheReader<R>) -> Result<Self> {
        let name = reader.read_string()?;
        let frame_rate = reader.read_f32()?;
        let tracks = reader.read_items::<BoneAnimationTrack>()?;
        Ok(AnimationClip::new(&name, frame_rate, tracks))
    }
}

impl CacheSerialize for AnimationLibrary {
    fn write_to<W: Write>(&self, writer: &mut CacheWriter<W>) -> Result<()> {
        writer.write_len(self.len())?;
        for clip in self.iter() {
            clip.write_to(writer)?;
        }
        Ok(())
    }

    fn read_from<R: Read>(reader: &mut CacheReader<R>) -> Result<Self> {
        let clips = reader.read_items::<AnimationClip>()?;
        Ok(AnimationLibrary::new(clips))
    }
}

impl<T: CacheSerialize> CacheSerialize for Arc<T> {
    fn write_to<W: Write>(&self, writer: &mut CacheWriter<W>) -> Result<()> {
        self.as_ref().write_to(writer)
    }

    fn read_from<R: Read>(reader: &mut CacheReader<R>) -> Result<Self> {
        T::read_from(reader).map(Arc::new)
    }
}
