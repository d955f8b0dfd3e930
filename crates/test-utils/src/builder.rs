//! Fluent construction of [`FileSnapshot`]s for tests.
//!
//! `eos_grid` and `eos_swath` lay an HDF-EOS2 object out the way the
//! HDF-EOS2 library does: a lone vgroup of class `GRID` or `SWATH` holding
//! `Data Fields` and `Geolocation Fields` vgroups, with every field stored as
//! an SDS carrying the object's native field attributes.

use h4_common::{
    AttrSpec, ChildKind, ChildRef, EosObjectSpec, FieldDescriptor, FileSnapshot, SdsSpec, VdataSpec, VgroupSpec,
};

const FIRST_REF: i32 = 2;

/// Builds a snapshot, handing out unique object references.
#[derive(Debug, Clone)]
pub struct SnapshotBuilder {
    snapshot: FileSnapshot,
    next_ref: i32,
}

impl SnapshotBuilder {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            snapshot: FileSnapshot::new(path),
            next_ref: FIRST_REF,
        }
    }

    fn allocate(&mut self) -> i32 {
        let reference = self.next_ref;
        self.next_ref += 1;
        reference
    }

    pub fn global(mut self, attr: AttrSpec) -> Self {
        self.snapshot.global_attributes.push(attr);
        self
    }

    pub fn global_text(self, name: &str, text: &str) -> Self {
        self.global(AttrSpec::text(name, text))
    }

    /// Add a plain SDS and return the builder; the reference is assigned here.
    pub fn sds(mut self, mut sds: SdsSpec) -> Self {
        sds.reference = self.allocate();
        self.snapshot.datasets.push(sds);
        self
    }

    pub fn vgroup(mut self, vgroup: VgroupSpec) -> Self {
        self.next_ref = self.next_ref.max(vgroup.reference + 1);
        self.snapshot.vgroups.push(vgroup);
        self
    }

    pub fn vdata(mut self, vdata: VdataSpec) -> Self {
        self.next_ref = self.next_ref.max(vdata.reference + 1);
        self.snapshot.vdatas.push(vdata);
        self
    }

    /// Add a grid with its SDS-backed data fields.
    pub fn eos_grid(mut self, grid: EosObjectSpec) -> Self {
        self.add_eos_object(&grid, "GRID");
        self.snapshot.grids.push(grid);
        self
    }

    /// Add a swath with its SDS-backed geolocation and data fields.
    pub fn eos_swath(mut self, swath: EosObjectSpec) -> Self {
        self.add_eos_object(&swath, "SWATH");
        self.snapshot.swaths.push(swath);
        self
    }

    fn add_eos_object(&mut self, object: &EosObjectSpec, class: &str) {
        let mut branches = Vec::new();
        for (branch, fields) in [("Geolocation Fields", &object.geo_fields), ("Data Fields", &object.data_fields)] {
            if fields.is_empty() {
                continue;
            }
            let children = fields.iter().map(|f| self.field_sds(object, f)).collect();
            let reference = self.allocate();
            self.snapshot.vgroups.push(VgroupSpec {
                reference,
                name: branch.to_string(),
                class: format!("{class} Vgroup"),
                lone: false,
                children,
                attributes: Vec::new(),
            });
            branches.push(ChildRef {
                kind: ChildKind::Vgroup,
                reference,
            });
        }

        let reference = self.allocate();
        self.snapshot.vgroups.push(VgroupSpec {
            reference,
            name: object.name.clone(),
            class: class.to_string(),
            lone: true,
            children: branches,
            attributes: Vec::new(),
        });
    }

    fn field_sds(&mut self, object: &EosObjectSpec, field: &FieldDescriptor) -> ChildRef {
        let reference = self.allocate();
        self.snapshot.datasets.push(SdsSpec {
            name: field.name.clone(),
            reference,
            number_type: field.number_type,
            dims: field.dimensions.clone(),
            attributes: object.field_attributes.get(&field.name).cloned().unwrap_or_default(),
            dim_scale: false,
        });
        ChildRef {
            kind: ChildKind::Sds,
            reference,
        }
    }

    pub fn build(self) -> FileSnapshot {
        self.snapshot
    }
}

/// An [`EosObjectSpec`] with native attributes for one field.
pub fn with_field_attrs(mut object: EosObjectSpec, field: &str, attrs: Vec<AttrSpec>) -> EosObjectSpec {
    object.field_attributes.insert(field.to_string(), attrs);
    object
}
