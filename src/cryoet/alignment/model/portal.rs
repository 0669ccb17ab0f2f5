use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::cryoet::alignment::error::{Result, ToolError};
use crate::cryoet::alignment::geometry::{self, RotationMatrix};

/// Format tag written for alignments derived from IMOD.
pub const IMOD_FORMAT: &str = "IMOD";
/// Format tag written for alignments derived from AreTomo3.
pub const ARETOMO3_FORMAT: &str = "ARETOMO3";

/// Three-component vector stored as a `{"x", "y", "z"}` object.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Vec3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Vec3 {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }
}

impl From<[f64; 3]> for Vec3 {
    fn from([x, y, z]: [f64; 3]) -> Self {
        Self { x, y, z }
    }
}

/// Kind of alignment carried by an interchange document.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AlignmentType {
    #[default]
    Global,
    Local,
}

/// Canonical alignment parameters of one retained section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerSectionParameters {
    /// 0-based index into the original, unfiltered tilt series.
    pub z_index: usize,
    /// Tilt angle in degrees.
    pub tilt_angle: f64,
    /// Rotation about the axis orthogonal to the tilt axis, in degrees.
    #[serde(rename = "volume_x_rotation", alias = "secondary_rotation")]
    pub secondary_rotation: f64,
    pub in_plane_rotation: RotationMatrix,
    pub x_offset: f64,
    pub y_offset: f64,
}

impl PerSectionParameters {
    /// Tilt axis angle in degrees recovered from the in-plane rotation.
    pub fn tilt_axis_rotation(&self) -> f64 {
        geometry::matrix_to_angle(&geometry::to_matrix(&self.in_plane_rotation))
    }

    pub fn set_tilt_axis_rotation(&mut self, angle_degrees: f64) {
        self.in_plane_rotation = geometry::from_matrix(&geometry::angle_to_matrix(angle_degrees));
    }

    /// Numeric row: z_index, tilt, secondary rotation, matrix (row-major), offsets.
    pub fn to_row(&self) -> [f64; 9] {
        let m = &self.in_plane_rotation;
        [
            self.z_index as f64,
            self.tilt_angle,
            self.secondary_rotation,
            m[0][0],
            m[0][1],
            m[1][0],
            m[1][1],
            self.x_offset,
            self.y_offset,
        ]
    }

    pub(crate) fn from_row(row: &[f64; 9]) -> Self {
        Self {
            z_index: row[0].round().max(0.0) as usize,
            tilt_angle: row[1],
            secondary_rotation: row[2],
            in_plane_rotation: [[row[3], row[4]], [row[5], row[6]]],
            x_offset: row[7],
            y_offset: row[8],
        }
    }
}

/// Alignment in the data portal interchange format.
///
/// Sections are keyed by `z_index`; the list form only exists in the JSON
/// document, where it is written in ascending `z_index` order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InterchangeAlignment {
    pub affine_transformation_matrix: [[f64; 4]; 4],
    pub alignment_type: AlignmentType,
    pub format: String,
    pub is_canonical: bool,
    pub tilt_offset: f64,
    pub volume_offset: Vec3,
    pub x_rotation_offset: f64,
    #[serde(rename = "per_section_alignment_parameters", with = "section_list")]
    sections: BTreeMap<usize, PerSectionParameters>,
    pub volume_dimension: Vec3,
}

pub const IDENTITY_4X4: [[f64; 4]; 4] = [
    [1.0, 0.0, 0.0, 0.0],
    [0.0, 1.0, 0.0, 0.0],
    [0.0, 0.0, 1.0, 0.0],
    [0.0, 0.0, 0.0, 1.0],
];

impl InterchangeAlignment {
    /// Creates a global, canonical alignment with identity affine and zero offsets.
    pub fn new(format: impl Into<String>, volume_dimension: Vec3) -> Self {
        Self {
            affine_transformation_matrix: IDENTITY_4X4,
            alignment_type: AlignmentType::Global,
            format: format.into(),
            is_canonical: true,
            tilt_offset: 0.0,
            volume_offset: Vec3::default(),
            x_rotation_offset: 0.0,
            sections: BTreeMap::new(),
            volume_dimension,
        }
    }

    /// Inserts a section, replacing any previous entry with the same `z_index`.
    pub fn insert_section(&mut self, section: PerSectionParameters) -> Option<PerSectionParameters> {
        self.sections.insert(section.z_index, section)
    }

    /// Keyed view of the per-section parameters.
    pub fn sections(&self) -> &BTreeMap<usize, PerSectionParameters> {
        &self.sections
    }

    pub fn section(&self, z_index: usize) -> Option<&PerSectionParameters> {
        self.sections.get(&z_index)
    }

    /// Per-section parameters in ascending `z_index` order.
    pub fn per_section_alignment_parameters(&self) -> impl Iterator<Item = &PerSectionParameters> {
        self.sections.values()
    }

    pub fn section_count(&self) -> usize {
        self.sections.len()
    }

    /// Sorted original-frame indices below `frame_count` that carry no section.
    pub fn get_skipped_sections(&self, frame_count: usize) -> Vec<usize> {
        (0..frame_count)
            .filter(|z_index| !self.sections.contains_key(z_index))
            .collect()
    }

    /// Median tilt-axis angle over all sections, `None` when there are none.
    pub fn get_median_tilt_axis(&self) -> Option<f64> {
        let mut angles: Vec<f64> = self
            .sections
            .values()
            .map(PerSectionParameters::tilt_axis_rotation)
            .collect();
        if angles.is_empty() {
            return None;
        }
        angles.sort_by(f64::total_cmp);
        let mid = angles.len() / 2;
        if angles.len() % 2 == 1 {
            Some(angles[mid])
        } else {
            Some((angles[mid - 1] + angles[mid]) / 2.0)
        }
    }

    pub fn section_rows(&self) -> Vec<[f64; 9]> {
        self.sections.values().map(PerSectionParameters::to_row).collect()
    }

    /// Replaces every section with the given numeric rows. Rows must have
    /// nine columns and distinct z indices.
    pub fn set_section_rows<R: AsRef<[f64]>>(&mut self, rows: &[R]) -> Result<()> {
        let mut sections = BTreeMap::new();
        for (index, row) in rows.iter().enumerate() {
            let row: &[f64; 9] = row.as_ref().try_into().map_err(|_| {
                ToolError::ShapeMismatch(format!(
                    "section row {index} has {} columns, expected 9",
                    row.as_ref().len()
                ))
            })?;
            let section = PerSectionParameters::from_row(row);
            let z_index = section.z_index;
            if sections.insert(z_index, section).is_some() {
                return Err(ToolError::StructuralMismatch(format!(
                    "section row {index} repeats z_index {z_index}"
                )));
            }
        }
        self.sections = sections;
        Ok(())
    }
}

mod section_list {
    use std::collections::BTreeMap;

    use serde::de::Error;
    use serde::{Deserialize, Deserializer, Serializer};

    use super::PerSectionParameters;

    pub fn serialize<S: Serializer>(
        sections: &BTreeMap<usize, PerSectionParameters>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(sections.values())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<BTreeMap<usize, PerSectionParameters>, D::Error> {
        let list = Vec::<PerSectionParameters>::deserialize(deserializer)?;
        let mut sections = BTreeMap::new();
        for section in list {
            let z_index = section.z_index;
            if sections.insert(z_index, section).is_some() {
                return Err(D::Error::custom(format!("duplicate z_index {z_index}")));
            }
        }
        Ok(sections)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn section(z_index: usize, angle: f64) -> PerSectionParameters {
        let mut section = PerSectionParameters {
            z_index,
            tilt_angle: -60.0 + z_index as f64 * 1.5,
            secondary_rotation: 0.0,
            in_plane_rotation: [[1.0, 0.0], [0.0, 1.0]],
            x_offset: 0.0,
            y_offset: 0.0,
        };
        section.set_tilt_axis_rotation(angle);
        section
    }

    #[test]
    fn median_tilt_axis_of_constant_rotation() {
        let mut alignment = InterchangeAlignment::new(ARETOMO3_FORMAT, Vec3::default());
        for z_index in 0..3 {
            alignment.insert_section(section(z_index, -12.0));
        }
        let median = alignment.get_median_tilt_axis().expect("median available");
        assert!((median + 12.0).abs() < 1e-9);
    }

    #[test]
    fn median_of_even_count_averages_middle_values() {
        let mut alignment = InterchangeAlignment::new(IMOD_FORMAT, Vec3::default());
        for (z_index, angle) in [(0, 10.0), (1, -20.0), (2, 30.0), (3, 0.0)] {
            alignment.insert_section(section(z_index, angle));
        }
        let median = alignment.get_median_tilt_axis().expect("median available");
        assert!((median - 5.0).abs() < 1e-9);
    }

    #[test]
    fn median_of_empty_alignment_is_none() {
        let alignment = InterchangeAlignment::new(IMOD_FORMAT, Vec3::default());
        assert_eq!(alignment.get_median_tilt_axis(), None);
    }

    #[test]
    fn skipped_sections_lists_missing_indices() {
        let mut alignment = InterchangeAlignment::new(IMOD_FORMAT, Vec3::default());
        for z_index in [1, 2, 5] {
            alignment.insert_section(section(z_index, 0.0));
        }
        assert_eq!(alignment.get_skipped_sections(7), vec![0, 3, 4, 6]);
    }

    #[test]
    fn sections_serialize_in_ascending_order() {
        let mut alignment = InterchangeAlignment::new(IMOD_FORMAT, Vec3::default());
        alignment.insert_section(section(4, 0.0));
        alignment.insert_section(section(2, 0.0));
        let json = serde_json::to_value(&alignment).expect("serialized");
        let indices: Vec<u64> = json["per_section_alignment_parameters"]
            .as_array()
            .expect("section list")
            .iter()
            .map(|entry| entry["z_index"].as_u64().expect("z_index"))
            .collect();
        assert_eq!(indices, vec![2, 4]);
        assert_eq!(json["alignment_type"], "GLOBAL");
        assert!(json["per_section_alignment_parameters"][0]
            .get("volume_x_rotation")
            .is_some());
    }

    #[test]
    fn section_rows_mirror_sections() {
        let mut alignment = InterchangeAlignment::new(IMOD_FORMAT, Vec3::default());
        alignment.insert_section(section(3, 45.0));
        let rows = alignment.section_rows();
        let mut restored = InterchangeAlignment::new(IMOD_FORMAT, Vec3::default());
        restored.set_section_rows(&rows).expect("rows accepted");
        assert_eq!(restored, alignment);

        let short = vec![vec![0.0; 8]];
        assert!(matches!(
            restored.set_section_rows(&short),
            Err(ToolError::ShapeMismatch(_))
        ));
        let repeated = vec![rows[0], rows[0]];
        assert!(matches!(
            restored.set_section_rows(&repeated),
            Err(ToolError::StructuralMismatch(_))
        ));
    }
}
