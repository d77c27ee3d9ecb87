use std::sync::Arc;

use super::{ChunkSnapshot, Face, Mesh, Quad};
use crate::world::block::BlockId;
use crate::world::chunk::{CHUNK_DEPTH, CHUNK_HEIGHT, CHUNK_WIDTH};

const AXIS_SIZE: [usize; 3] = [CHUNK_WIDTH, CHUNK_HEIGHT, CHUNK_DEPTH];

/// Mesh a snapshot into a renderable triangle list.
pub fn mesh_snapshot(snapshot: &ChunkSnapshot, texture: &Arc<str>) -> Mesh {
    let quads = greedy_quads(snapshot);
    Mesh::from_quads(&quads, Arc::clone(texture))
}

/// Merge visible faces into the fewest axis-aligned rectangles.
///
/// A face is visible when its voxel is solid and the voxel in the face
/// direction is air, sampled across chunk borders. Rectangles never span
/// differing block ids.
pub fn greedy_quads(snapshot: &ChunkSnapshot) -> Vec<Quad> {
    let mut quads = Vec::new();
    let mut mask: Vec<Option<BlockId>> = Vec::new();
    for face in Face::ALL {
        sweep_face(snapshot, face, &mut mask, &mut quads);
    }
    quads
}

fn sweep_face(
    snapshot: &ChunkSnapshot,
    face: Face,
    mask: &mut Vec<Option<BlockId>>,
    quads: &mut Vec<Quad>,
) {
    let axis = face.axis();
    let u_axis = (axis + 1) % 3;
    let v_axis = (axis + 2) % 3;
    let width = AXIS_SIZE[u_axis];
    let height = AXIS_SIZE[v_axis];
    let step = face.normal();

    mask.clear();
    mask.resize(width * height, None);

    for slice in 0..AXIS_SIZE[axis] {
        for j in 0..height {
            for i in 0..width {
                let mut pos = [0i32; 3];
                pos[axis] = slice as i32;
                pos[u_axis] = i as i32;
                pos[v_axis] = j as i32;
                let block = snapshot.sample(pos[0], pos[1], pos[2]);
                let visible = block.is_solid()
                    && snapshot
                        .sample(pos[0] + step[0], pos[1] + step[1], pos[2] + step[2])
                        .is_air();
                mask[j * width + i] = visible.then_some(block);
            }
        }

        let plane = if face.is_positive() { slice + 1 } else { slice };

        let mut j = 0;
        while j < height {
            let mut i = 0;
            while i < width {
                let Some(block) = mask[j * width + i] else {
                    i += 1;
                    continue;
                };

                let mut quad_width = 1;
                while i + quad_width < width && mask[j * width + i + quad_width] == Some(block) {
                    quad_width += 1;
                }

                let mut quad_height = 1;
                'grow: while j + quad_height < height {
                    let row = (j + quad_height) * width;
                    for k in 0..quad_width {
                        if mask[row + i + k] != Some(block) {
                            break 'grow;
                        }
                    }
                    quad_height += 1;
                }

                let mut origin = [0i32; 3];
                origin[axis] = plane as i32;
                origin[u_axis] = i as i32;
                origin[v_axis] = j as i32;
                quads.push(Quad {
                    face,
                    origin,
                    width: quad_width as u32,
                    height: quad_height as u32,
                    block,
                });

                for dy in 0..quad_height {
                    let row = (j + dy) * width;
                    mask[row + i..row + i + quad_width].fill(None);
                }
                i += quad_width;
            }
            j += 1;
        }
    }
}
