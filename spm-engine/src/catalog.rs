//! 文档级截面与钢材目录，保存在命名对象字典中，同名条目只登记一次。

use spm_core::document::TypedValue;
use tracing::debug;

use crate::attributes::{CrossSection, Steel};
use crate::host::RecordStore;
use crate::records::{LoadStatus, RecordReader};

const CROSS_SECTION_PREFIX: &str = "CrossSection:";
const STEEL_PREFIX: &str = "Steel:";

fn cross_section_name(cross_section: &CrossSection) -> String {
    format!(
        "{CROSS_SECTION_PREFIX}{:.3}x{:.3}",
        cross_section.width.millimeters(),
        cross_section.height.millimeters()
    )
}

fn steel_name(steel: &Steel) -> String {
    format!(
        "{STEEL_PREFIX}{:.3}/{:.3}",
        steel.yield_stress.megapascals(),
        steel.elastic_modulus.megapascals()
    )
}

/// 登记截面；已存在时返回 `false`。
pub fn register_cross_section(store: &mut dyn RecordStore, cross_section: &CrossSection) -> bool {
    let name = cross_section_name(cross_section);
    let added = store.write_named(
        &name,
        &[
            TypedValue::Real(cross_section.width.millimeters()),
            TypedValue::Real(cross_section.height.millimeters()),
        ],
        false,
    );
    if added {
        debug!(name = %name, "登记截面");
    }
    added
}

pub fn register_steel(store: &mut dyn RecordStore, steel: &Steel) -> bool {
    let name = steel_name(steel);
    let added = store.write_named(
        &name,
        &[
            TypedValue::Real(steel.yield_stress.megapascals()),
            TypedValue::Real(steel.elastic_modulus.megapascals()),
        ],
        false,
    );
    if added {
        debug!(name = %name, "登记钢材");
    }
    added
}

fn read_pairs(store: &dyn RecordStore, prefix: &str) -> Vec<(f64, f64)> {
    store
        .named_records()
        .into_iter()
        .filter(|(name, _)| name.starts_with(prefix))
        .filter_map(|(_, values)| {
            let mut reader = RecordReader::new(&values);
            let first = reader.real(0.0);
            let second = reader.real(0.0);
            (reader.status() == LoadStatus::Loaded).then_some((first, second))
        })
        .collect()
}

/// 已登记的全部截面，按名称排序。
pub fn cross_sections(store: &dyn RecordStore) -> Vec<CrossSection> {
    read_pairs(store, CROSS_SECTION_PREFIX)
        .into_iter()
        .map(|(width, height)| CrossSection::new(width, height))
        .collect()
}

pub fn steels(store: &dyn RecordStore) -> Vec<Steel> {
    read_pairs(store, STEEL_PREFIX)
        .into_iter()
        .map(|(yield_stress, modulus)| Steel::new(yield_stress, modulus))
        .collect()
}

#[cfg(test)]
mod tests {
    use spm_core::document::Document;

    use super::*;

    #[test]
    fn cross_sections_are_registered_once() {
        let mut doc = Document::new();
        let section = CrossSection::new(100.0, 200.0);
        assert!(register_cross_section(&mut doc, &section));
        assert!(!register_cross_section(&mut doc, &section));
        assert!(register_cross_section(&mut doc, &CrossSection::new(100.0, 250.0)));
        assert_eq!(cross_sections(&doc).len(), 2);
        assert!(cross_sections(&doc).contains(&section));
    }

    #[test]
    fn steels_and_sections_do_not_mix() {
        let mut doc = Document::new();
        register_steel(&mut doc, &Steel::default());
        register_cross_section(&mut doc, &CrossSection::default());
        assert_eq!(steels(&doc), vec![Steel::default()]);
        assert_eq!(cross_sections(&doc), vec![CrossSection::default()]);
    }
}
