//! Mesh from raw vertex arrays (`mesh::raw`)
//!
//! ```json
//! {
//!   "ps": [-1,-1,0, 1,-1,0, 1,1,0, -1,1,0],
//!   "ns": [0,0,1],
//!   "fs": { "p": [0,1,2, 0,2,3], "n": [0,0,0, 0,0,0] }
//! }
//! ```
//!
//! `fs` may also be a plain array of position indices.

use glam::{Vec2, Vec3};
use serde::Deserialize;
use serde_json::json;

use lumina_core::geometry::Triangle;
use lumina_core::interfaces::Mesh;
use lumina_core::{Component, ConfigExt, ConfigValue, ConstructContext, Error, Result};

#[derive(Deserialize)]
#[serde(untagged)]
enum FaceConfig {
    Positions(Vec<u32>),
    Indexed {
        p: Vec<u32>,
        #[serde(default)]
        n: Option<Vec<u32>>,
        #[serde(default)]
        t: Option<Vec<u32>>,
    },
}

#[derive(Debug, Default)]
pub struct RawMesh {
    ps: Vec<Vec3>,
    ns: Vec<Vec3>,
    ts: Vec<Vec2>,
    fp: Vec<[u32; 3]>,
    fn_: Option<Vec<[u32; 3]>>,
    ft: Option<Vec<[u32; 3]>>,
}

fn chunks<const N: usize>(field: &str, flat: Vec<f32>) -> Result<Vec<[f32; N]>> {
    if flat.len() % N != 0 {
        return Err(Error::validation(
            field,
            format!("length {} is not a multiple of {}", flat.len(), N),
        ));
    }
    Ok(flat
        .chunks_exact(N)
        .map(|c| {
            let mut out = [0.0; N];
            out.copy_from_slice(c);
            out
        })
        .collect())
}

fn faces(field: &str, flat: Vec<u32>, bound: usize) -> Result<Vec<[u32; 3]>> {
    if let Some(bad) = flat.iter().find(|&&i| i as usize >= bound) {
        return Err(Error::validation(
            field,
            format!("index {} out of range (have {} entries)", bad, bound),
        ));
    }
    if flat.len() % 3 != 0 {
        return Err(Error::validation(
            field,
            format!("length {} is not a multiple of 3", flat.len()),
        ));
    }
    Ok(flat.chunks_exact(3).map(|c| [c[0], c[1], c[2]]).collect())
}

fn flatten<const N: usize>(items: impl Iterator<Item = [f32; N]>) -> Vec<f32> {
    items.flat_map(|a| a.into_iter()).collect()
}

impl RawMesh {
    fn face_count_matches(&self, other: &Option<Vec<[u32; 3]>>) -> bool {
        other.as_ref().map_or(true, |f| f.len() == self.fp.len())
    }
}

impl Component for RawMesh {
    fn construct(&mut self, config: &ConfigValue, _ctx: &mut ConstructContext<'_>) -> Result<()> {
        self.ps = chunks::<3>("ps", config.required("ps")?)?
            .into_iter()
            .map(Vec3::from)
            .collect();
        self.ns = chunks::<3>("ns", config.value_or("ns", Vec::new())?)?
            .into_iter()
            .map(Vec3::from)
            .collect();
        self.ts = chunks::<2>("ts", config.value_or("ts", Vec::new())?)?
            .into_iter()
            .map(Vec2::from)
            .collect();

        match config.required::<FaceConfig>("fs")? {
            FaceConfig::Positions(p) => {
                self.fp = faces("fs", p, self.ps.len())?;
                self.fn_ = None;
                self.ft = None;
            }
            FaceConfig::Indexed { p, n, t } => {
                self.fp = faces("fs.p", p, self.ps.len())?;
                self.fn_ = n.map(|n| faces("fs.n", n, self.ns.len())).transpose()?;
                self.ft = t.map(|t| faces("fs.t", t, self.ts.len())).transpose()?;
            }
        }
        if !self.face_count_matches(&self.fn_) || !self.face_count_matches(&self.ft) {
            return Err(Error::validation("fs", "index arrays have different lengths"));
        }
        Ok(())
    }

    fn serialize(&self) -> Option<ConfigValue> {
        let flat = |f: &Vec<[u32; 3]>| f.iter().flatten().copied().collect::<Vec<u32>>();
        let mut fs = json!({ "p": flat(&self.fp) });
        if let Some(n) = &self.fn_ {
            fs["n"] = json!(flat(n));
        }
        if let Some(t) = &self.ft {
            fs["t"] = json!(flat(t));
        }
        Some(json!({
            "ps": flatten(self.ps.iter().map(|v| v.to_array())),
            "ns": flatten(self.ns.iter().map(|v| v.to_array())),
            "ts": flatten(self.ts.iter().map(|v| v.to_array())),
            "fs": fs,
        }))
    }

    fn as_mesh(&self) -> Option<&(dyn Mesh + 'static)> {
        Some(self)
    }
}

impl Mesh for RawMesh {
    fn triangle_count(&self) -> usize {
        self.fp.len()
    }

    fn triangle(&self, face: usize) -> Option<Triangle> {
        let [a, b, c] = *self.fp.get(face)?;
        let p = |i: u32| self.ps[i as usize];
        let tri = Triangle::new(p(a), p(b), p(c));
        match self.fn_.as_ref().and_then(|f| f.get(face)) {
            Some(&[na, nb, nc]) => {
                let n = |i: u32| self.ns[i as usize];
                Some(tri.with_normals([n(na), n(nb), n(nc)]))
            }
            None => Some(tri),
        }
    }
}
