//! glTF / GLB decoding into [`ModelData`].

use std::sync::Arc;

use crate::{
    data_structures::{
        instance::Instance,
        model::{Material, MeshData, ModelData, ModelNode, ModelVertex},
    },
    resources::{
        animation::{AnimationClip, Channel, Keyframes},
        texture::decode_image,
        AssetSource, LoadError,
    },
};

/// Resolves `uri` against the directory of `base`.
fn sibling(base: &str, uri: &str) -> String {
    match base.rfind('/') {
        Some(idx) => format!("{}/{}", &base[..idx], uri),
        None => uri.to_string(),
    }
}

async fn load_buffers(
    source: &dyn AssetSource,
    url: &str,
    gltf: &gltf::Gltf,
) -> Result<Vec<Vec<u8>>, LoadError> {
    let mut buffer_data = Vec::new();
    for buffer in gltf.buffers() {
        match buffer.source() {
            gltf::buffer::Source::Bin => {
                let blob = gltf
                    .blob
                    .as_deref()
                    .ok_or_else(|| LoadError::decode(url, "binary chunk is missing"))?;
                buffer_data.push(blob.into());
            }
            gltf::buffer::Source::Uri(uri) => {
                if uri.starts_with("data:") {
                    return Err(LoadError::decode(url, "embedded data URIs are not supported"));
                }
                let buffer_url = sibling(url, uri);
                let bin = source
                    .fetch(&buffer_url)
                    .await
                    .map_err(|source| LoadError::Fetch {
                        url: buffer_url.clone(),
                        source,
                    })?;
                buffer_data.push(bin);
            }
        }
    }
    Ok(buffer_data)
}

async fn load_images(
    source: &dyn AssetSource,
    url: &str,
    gltf: &gltf::Gltf,
    buffers: &[Vec<u8>],
) -> Result<Vec<Arc<image::RgbaImage>>, LoadError> {
    let mut images = Vec::new();
    for img in gltf.images() {
        let decoded = match img.source() {
            gltf::image::Source::View { view, mime_type: _ } => {
                let buffer = buffers
                    .get(view.buffer().index())
                    .ok_or_else(|| LoadError::decode(url, "image view points past the buffers"))?;
                let bytes = buffer
                    .get(view.offset()..view.offset() + view.length())
                    .ok_or_else(|| LoadError::decode(url, "image view is out of bounds"))?;
                decode_image(url, bytes)?
            }
            gltf::image::Source::Uri { uri, mime_type: _ } => {
                let image_url = sibling(url, uri);
                crate::resources::texture::load_image(source, &image_url).await?
            }
        };
        images.push(Arc::new(decoded));
    }
    Ok(images)
}

fn load_materials(gltf: &gltf::Gltf, images: &[Arc<image::RgbaImage>]) -> Vec<Material> {
    let mut materials: Vec<Material> = gltf
        .materials()
        .map(|material| {
            let pbr = material.pbr_metallic_roughness();
            let name = material.name().unwrap_or("material");
            let mut mat = Material::color(name, pbr.base_color_factor());
            mat.emissive = material.emissive_factor();
            if let Some(info) = pbr.base_color_texture() {
                match images.get(info.texture().source().index()) {
                    Some(image) => mat.set_texture(image.clone()),
                    None => log::warn!("material {} references a missing image", name),
                }
            }
            mat
        })
        .collect();
    // primitives without a material use the glTF default
    materials.push(Material::color("default", [1.0, 1.0, 1.0, 1.0]));
    materials
}

fn read_primitive(
    mesh_name: &str,
    primitive: &gltf::Primitive,
    buffers: &[Vec<u8>],
    default_material: usize,
) -> Option<MeshData> {
    if primitive.mode() != gltf::mesh::Mode::Triangles {
        log::warn!("mesh {} uses {:?}, only triangles are drawn", mesh_name, primitive.mode());
        return None;
    }
    let reader = primitive.reader(|buffer| buffers.get(buffer.index()).map(|b| b.as_slice()));
    let positions: Vec<[f32; 3]> = reader.read_positions()?.collect();
    let normals: Vec<[f32; 3]> = reader
        .read_normals()
        .map(|n| n.collect())
        .unwrap_or_else(|| vec![[0.0, 0.0, 1.0]; positions.len()]);
    let tex_coords: Vec<[f32; 2]> = reader
        .read_tex_coords(0)
        .map(|t| t.into_f32().collect())
        .unwrap_or_else(|| vec![[0.0, 0.0]; positions.len()]);
    let vertices = positions
        .iter()
        .enumerate()
        .map(|(i, position)| ModelVertex {
            position: *position,
            tex_coords: tex_coords.get(i).copied().unwrap_or([0.0, 0.0]),
            normal: normals.get(i).copied().unwrap_or([0.0, 0.0, 1.0]),
        })
        .collect::<Vec<_>>();
    let indices = match reader.read_indices() {
        Some(indices) => indices.into_u32().collect(),
        None => (0..vertices.len() as u32).collect(),
    };
    let material = primitive.material().index().unwrap_or(default_material);
    Some(MeshData::new(mesh_name, vertices, indices, material))
}

fn load_animations(gltf: &gltf::Gltf, buffers: &[Vec<u8>]) -> Vec<AnimationClip> {
    gltf.animations()
        .map(|animation| {
            let channels = animation
                .channels()
                .map(|channel| {
                    let reader = channel.reader(|buffer| buffers.get(buffer.index()).map(|b| b.as_slice()));
                    let timestamps: Vec<f32> = reader
                        .read_inputs()
                        .map(|inputs| inputs.collect())
                        .unwrap_or_default();
                    let keyframes = match reader.read_outputs() {
                        Some(gltf::animation::util::ReadOutputs::Translations(translations)) => {
                            Keyframes::Translation(translations.map(Into::into).collect())
                        }
                        Some(gltf::animation::util::ReadOutputs::Rotations(rotations)) => {
                            Keyframes::Rotation(
                                rotations
                                    .into_f32()
                                    .map(|[x, y, z, w]| cgmath::Quaternion::new(w, x, y, z))
                                    .collect(),
                            )
                        }
                        Some(gltf::animation::util::ReadOutputs::Scales(scales)) => {
                            Keyframes::Scale(scales.map(Into::into).collect())
                        }
                        // morph targets are not animated
                        Some(gltf::animation::util::ReadOutputs::MorphTargetWeights(_)) | None => {
                            Keyframes::Other
                        }
                    };
                    Channel {
                        node: channel.target().node().index(),
                        timestamps,
                        keyframes,
                    }
                })
                .collect();
            AnimationClip::new(animation.name().unwrap_or("Default"), channels)
        })
        .collect()
}

/// Decodes a glTF document. External buffers and images are fetched from
/// `source` relative to `url`.
pub async fn decode_model(
    source: &dyn AssetSource,
    url: &str,
    bytes: &[u8],
) -> Result<ModelData, LoadError> {
    let gltf = gltf::Gltf::from_slice(bytes).map_err(|e| LoadError::decode(url, e))?;
    let buffers = load_buffers(source, url, &gltf).await?;
    let images = load_images(source, url, &gltf, &buffers).await?;
    let materials = load_materials(&gltf, &images);
    let default_material = materials.len() - 1;

    let mut meshes = Vec::new();
    let mut mesh_slots: Vec<Vec<usize>> = Vec::new();
    for mesh in gltf.meshes() {
        let name = mesh.name().unwrap_or("mesh");
        let mut slots = Vec::new();
        for primitive in mesh.primitives() {
            if let Some(data) = read_primitive(name, &primitive, &buffers, default_material) {
                slots.push(meshes.len());
                meshes.push(data);
            }
        }
        mesh_slots.push(slots);
    }

    let nodes = gltf
        .nodes()
        .map(|node| {
            let (translation, [x, y, z, w], scale) = node.transform().decomposed();
            ModelNode {
                name: node.name().map(str::to_string),
                local: Instance {
                    position: translation.into(),
                    rotation: cgmath::Quaternion::new(w, x, y, z),
                    scale: scale.into(),
                },
                meshes: node
                    .mesh()
                    .and_then(|mesh| mesh_slots.get(mesh.index()).cloned())
                    .unwrap_or_default(),
                children: node.children().map(|child| child.index()).collect(),
            }
        })
        .collect();

    let roots = match gltf.default_scene().or_else(|| gltf.scenes().next()) {
        Some(scene) => scene.nodes().map(|node| node.index()).collect(),
        None => Vec::new(),
    };

    Ok(ModelData {
        nodes,
        roots,
        meshes,
        materials,
        animations: load_animations(&gltf, &buffers),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sibling_urls_share_the_directory() {
        assert_eq!(sibling("models/hut.gltf", "hut.bin"), "models/hut.bin");
        assert_eq!(sibling("hut.gltf", "hut.bin"), "hut.bin");
    }
}
