use crate::core::utils::ordered_set;
use crate::core::utils::segmentation::Segmentation;
use nalgebra::{Point3, Vector3};
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq)]
pub struct Atom {
    pub serial: usize,
    pub name: String,
    pub res_name: String,
    pub res_seq: isize,
    pub chain_id: char,
    pub position: Point3<f64>,
    pub charge: f64,
    pub ff_type: String,
    pub hetero: bool,
}

/// One frame of atomic coordinates, segmented into residues and chains.
///
/// Both segmentations run over atom indices: residue `r` owns the atoms in
/// `residues().range(r)`, chain `c` the atoms in `chains().range(c)`.
#[derive(Debug, Clone, PartialEq)]
pub struct Model {
    atoms: Vec<Atom>,
    residues: Segmentation,
    chains: Segmentation,
}

impl Model {
    /// Builds a model from atoms in file order. A new residue starts whenever the
    /// `(chain_id, res_seq)` pair changes, a new chain whenever `chain_id` changes.
    pub fn from_atoms(atoms: Vec<Atom>) -> Self {
        let mut residue_sizes = Vec::new();
        let mut chain_sizes = Vec::new();
        let mut last_residue: Option<(char, isize)> = None;
        let mut last_chain: Option<char> = None;

        for atom in &atoms {
            let residue_key = (atom.chain_id, atom.res_seq);
            if last_residue == Some(residue_key) {
                if let Some(size) = residue_sizes.last_mut() {
                    *size += 1;
                }
            } else {
                residue_sizes.push(1);
                last_residue = Some(residue_key);
            }

            if last_chain == Some(atom.chain_id) {
                if let Some(size) = chain_sizes.last_mut() {
                    *size += 1;
                }
            } else {
                chain_sizes.push(1);
                last_chain = Some(atom.chain_id);
            }
        }

        Self {
            atoms,
            residues: Segmentation::from_sizes(residue_sizes),
            chains: Segmentation::from_sizes(chain_sizes),
        }
    }

    pub fn atoms(&self) -> &[Atom] {
        &self.atoms
    }

    pub fn atom(&self, index: usize) -> Option<&Atom> {
        self.atoms.get(index)
    }

    pub fn atom_count(&self) -> usize {
        self.atoms.len()
    }

    pub fn residues(&self) -> &Segmentation {
        &self.residues
    }

    pub fn chains(&self) -> &Segmentation {
        &self.chains
    }

    pub fn residue_count(&self) -> usize {
        self.residues.segment_count()
    }

    pub fn chain_count(&self) -> usize {
        self.chains.segment_count()
    }

    /// Chain identifiers in order of first appearance.
    pub fn chain_ids(&self) -> Vec<char> {
        (0..self.chain_count())
            .filter_map(|c| self.chains.range(c))
            .filter_map(|range| self.atoms.get(range.start).map(|a| a.chain_id))
            .collect()
    }

    /// The first atom of a residue segment, which carries the residue's identity.
    pub fn residue_head(&self, residue: usize) -> Option<&Atom> {
        self.residues
            .range(residue)
            .and_then(|range| self.atoms.get(range.start))
    }

    pub fn all_atom_indices(&self) -> Vec<usize> {
        (0..self.atoms.len()).collect()
    }
}

/// An ordered sequence of model frames sharing one topology.
#[derive(Debug, Clone, PartialEq)]
pub struct Trajectory {
    frames: Vec<Arc<Model>>,
}

impl Trajectory {
    pub fn new(frames: Vec<Model>) -> Self {
        Self {
            frames: frames.into_iter().map(Arc::new).collect(),
        }
    }

    pub fn frame(&self, index: usize) -> Option<&Arc<Model>> {
        self.frames.get(index)
    }

    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }
}

/// A set of atoms drawn from one model. A full structure covers every atom; a component
/// covers an ordered subset.
#[derive(Debug, Clone, PartialEq)]
pub struct Structure {
    model: Arc<Model>,
    atoms: Vec<usize>,
}

impl Structure {
    pub fn full(model: Arc<Model>) -> Self {
        let atoms = model.all_atom_indices();
        Self { model, atoms }
    }

    /// Restricts a structure to `atoms`; indices outside the model are dropped.
    pub fn subset(model: Arc<Model>, atoms: Vec<usize>) -> Self {
        let count = model.atom_count();
        let atoms = ordered_set::from_unsorted(atoms)
            .into_iter()
            .filter(|&i| i < count)
            .collect();
        Self { model, atoms }
    }

    pub fn model(&self) -> &Arc<Model> {
        &self.model
    }

    pub fn atom_indices(&self) -> &[usize] {
        &self.atoms
    }

    pub fn atom_count(&self) -> usize {
        self.atoms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.atoms.is_empty()
    }

    pub fn residue_count(&self) -> usize {
        self.model.residues().project(&self.atoms).len()
    }

    pub fn centroid(&self) -> Option<Point3<f64>> {
        if self.atoms.is_empty() {
            return None;
        }
        let sum = self
            .atoms
            .iter()
            .filter_map(|&i| self.model.atom(i))
            .fold(Vector3::zeros(), |acc, atom| acc + atom.position.coords);
        Some(Point3::from(sum / self.atoms.len() as f64))
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;

    #[test]
    fn from_atoms_segments_residues_and_chains() {
        let model = small_model();
        assert_eq!(model.atom_count(), 5);
        assert_eq!(model.residue_count(), 3);
        assert_eq!(model.chain_count(), 2);
        assert_eq!(model.residues().range(1), Some(2..4));
        assert_eq!(model.chains().range(1), Some(4..5));
        assert_eq!(model.chain_ids(), vec!['A', 'B']);
        assert_eq!(model.residue_head(2).map(|a| a.res_name.as_str()), Some("HOH"));
    }

    #[test]
    fn subset_structure_counts_touched_residues() {
        let model = Arc::new(small_model());
        let subset = Structure::subset(model.clone(), vec![3, 1, 99]);
        assert_eq!(subset.atom_indices(), &[1, 3]);
        assert_eq!(subset.residue_count(), 2);
        assert_eq!(Structure::full(model).residue_count(), 3);
    }

    #[test]
    fn centroid_averages_atom_positions() {
        let model = Arc::new(small_model());
        let structure = Structure::subset(model, vec![0, 1]);
        let centroid = structure.centroid().unwrap();
        assert!((centroid.x - 1.5).abs() < 1e-12);
        assert!(Structure::subset(Arc::new(small_model()), vec![]).centroid().is_none());
    }

    #[test]
    fn trajectory_frames_are_shared() {
        let trajectory = Trajectory::new(vec![small_model(), small_model()]);
        assert_eq!(trajectory.frame_count(), 2);
        let a = trajectory.frame(0).unwrap().clone();
        assert!(Arc::ptr_eq(&a, trajectory.frame(0).unwrap()));
        assert!(trajectory.frame(2).is_none());
    }
}
