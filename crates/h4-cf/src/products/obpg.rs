//! OBPG ocean color level 2 and level 3 products.
//!
//! These store their linear scaling as `Slope`/`Intercept` (globally or per
//! field) instead of `scale_factor`/`add_offset`, and leave integer fields
//! without a `_FillValue`.

use h4_common::{CfType, Das, FieldType, H4Error, H4Result, NumberType, RawAttribute};

use super::{SpField, SpFile, SpType};
use crate::codec::print_float32;
use crate::reconcile::{ADD_OFFSET, FILL_VALUE, SCALE_FACTOR};

/// File-level scaling declared in the global attributes.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ObpgScaling {
    /// The `Scaling` global, e.g. `linear`.
    pub scaling: String,
    pub slope: Option<f32>,
    pub intercept: Option<f32>,
}

impl ObpgScaling {
    /// Read the globals. Non-OBPG files give the empty value.
    pub fn from_file(file: &SpFile) -> H4Result<Self> {
        let mut scaling = Self::default();
        if !file.sp_type.is_obpg() {
            return Ok(scaling);
        }
        for attr in &file.global_attributes {
            match attr.name.as_str() {
                "Scaling" => scaling.scaling = attr.text(),
                "Slope" | "slope" => scaling.slope = Some(coefficient(attr)?),
                "Intercept" | "intercept" => scaling.intercept = Some(coefficient(attr)?),
                _ => {}
            }
        }
        Ok(scaling)
    }
}

/// A slope or intercept value. Only 16/32-bit integers and floats occur.
fn coefficient(attr: &RawAttribute) -> H4Result<f32> {
    match attr.number_type {
        NumberType::Int16 | NumberType::Int32 | NumberType::Float32 | NumberType::Float64 => attr.first_as_f32(),
        other => Err(H4Error::UnsupportedType(format!(
            "{other:?} for OBPG attribute '{}'",
            attr.name
        ))),
    }
}

/// Add `scale_factor`, `add_offset` and `_FillValue` to one field.
///
/// Runs before the field's own attributes are copied, so it only looks at
/// the raw attribute list to decide what is missing.
pub fn add_obpg_special_attrs(das: &mut Das, file: &SpFile, field: &SpField, globals: &ObpgScaling) -> H4Result<()> {
    if !file.sp_type.is_obpg() || field.field_type != FieldType::General {
        return Ok(());
    }

    let mut slope = globals.slope;
    let mut intercept = globals.intercept;
    for attr in &field.attributes {
        match attr.name.as_str() {
            "Slope" | "slope" if globals.slope.is_none() => slope = Some(coefficient(attr)?),
            "Intercept" | "intercept" if globals.intercept.is_none() => intercept = Some(coefficient(attr)?),
            _ => {}
        }
    }

    let table = das.get_or_create(&field.new_name);
    let linear = file.sp_type == SpType::ObpgL2
        || (file.sp_type == SpType::ObpgL3 && globals.scaling.contains("linear"));
    if linear {
        if let (None, Some(slope)) = (field.attribute(SCALE_FACTOR), slope) {
            table.append_attr(SCALE_FACTOR, CfType::Float32, print_float32(slope))?;
        }
        if let (None, Some(intercept)) = (field.attribute(ADD_OFFSET), intercept) {
            table.append_attr(ADD_OFFSET, CfType::Float32, print_float32(intercept))?;
        }
    }

    if field.attribute(FILL_VALUE).is_none() {
        match field.number_type {
            NumberType::Int16 => table.append_attr(FILL_VALUE, CfType::Int16, "-32767")?,
            NumberType::Uint16 => table.append_attr(FILL_VALUE, CfType::UInt16, "65535")?,
            _ => {}
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn l3_file(scaling: &str) -> SpFile {
        SpFile {
            path: "/data/A2005001.L3m_DAY_CHL_chlor_a_4km".into(),
            sp_type: SpType::ObpgL3,
            global_attributes: vec![
                RawAttribute::from_text("Scaling", scaling),
                RawAttribute::from_values("Slope", NumberType::Float32, &[0.5f32]),
                RawAttribute::from_values("Intercept", NumberType::Float64, &[-2.0f64]),
            ],
            ..Default::default()
        }
    }

    #[test]
    fn test_linear_l3_gets_scale_and_fill() {
        let file = l3_file("linear");
        let globals = ObpgScaling::from_file(&file).unwrap();
        assert_eq!(globals.slope, Some(0.5));

        let field = SpField::new("l3m_data", NumberType::Int16);
        let mut das = Das::new();
        add_obpg_special_attrs(&mut das, &file, &field, &globals).unwrap();
        let t = das.get_table("l3m_data").unwrap();
        assert_eq!(t.first_value("scale_factor"), Some("0.5000000000"));
        assert_eq!(t.attr_type("add_offset"), Some(CfType::Float32));
        assert_eq!(t.first_value("_FillValue"), Some("-32767"));
    }

    #[test]
    fn test_logarithmic_l3_keeps_scaling_out() {
        let file = l3_file("logarithmic");
        let globals = ObpgScaling::from_file(&file).unwrap();
        let field = SpField::new("l3m_data", NumberType::Uint16);
        let mut das = Das::new();
        add_obpg_special_attrs(&mut das, &file, &field, &globals).unwrap();
        let t = das.get_table("l3m_data").unwrap();
        assert!(!t.contains("scale_factor"));
        assert_eq!(t.first_value("_FillValue"), Some("65535"));
    }

    #[test]
    fn test_field_slope_and_existing_scale() {
        let file = SpFile {
            sp_type: SpType::ObpgL2,
            ..Default::default()
        };
        let globals = ObpgScaling::from_file(&file).unwrap();
        let mut field = SpField::new("chlor_a", NumberType::Float32);
        field.attributes = vec![
            RawAttribute::from_values("slope", NumberType::Int32, &[2i32]),
            RawAttribute::from_values("add_offset", NumberType::Float32, &[1.0f32]),
        ];
        let mut das = Das::new();
        add_obpg_special_attrs(&mut das, &file, &field, &globals).unwrap();
        let t = das.get_table("chlor_a").unwrap();
        assert_eq!(t.first_value("scale_factor"), Some("2.000000000"));
        assert!(!t.contains("add_offset"));
        assert!(!t.contains("_FillValue"));
    }

    #[test]
    fn test_unsupported_slope_type() {
        let mut file = l3_file("linear");
        file.global_attributes[1] = RawAttribute::from_values("Slope", NumberType::Uint8, &[1u8]);
        assert!(matches!(
            ObpgScaling::from_file(&file),
            Err(H4Error::UnsupportedType(_))
        ));
    }
}
