//! Vehicle category alias table
//! Maps the free-text labels seen in registration exports onto the fixed category enum

use std::collections::HashMap;
use std::sync::LazyLock;

use crate::models::VehicleCategory;

/// Alias table - keys are lower-cased, whitespace-trimmed labels
pub static CATEGORY_ALIASES: LazyLock<HashMap<&'static str, VehicleCategory>> = LazyLock::new(|| {
    let mut m = HashMap::new();

    // Two wheelers
    m.insert("2w", VehicleCategory::TwoWheeler);
    m.insert("two wheeler", VehicleCategory::TwoWheeler);
    m.insert("two-wheeler", VehicleCategory::TwoWheeler);
    m.insert("twowheeler", VehicleCategory::TwoWheeler);
    m.insert("2 wheeler", VehicleCategory::TwoWheeler);
    m.insert("motorcycle", VehicleCategory::TwoWheeler);
    m.insert("scooter", VehicleCategory::TwoWheeler);

    // Three wheelers
    m.insert("3w", VehicleCategory::ThreeWheeler);
    m.insert("three wheeler", VehicleCategory::ThreeWheeler);
    m.insert("three-wheeler", VehicleCategory::ThreeWheeler);
    m.insert("threewheeler", VehicleCategory::ThreeWheeler);
    m.insert("3 wheeler", VehicleCategory::ThreeWheeler);
    m.insert("auto rickshaw", VehicleCategory::ThreeWheeler);
    m.insert("e-rickshaw", VehicleCategory::ThreeWheeler);
    m.insert("tuk-tuk", VehicleCategory::ThreeWheeler);

    // Four wheelers
    m.insert("4w", VehicleCategory::FourWheeler);
    m.insert("four wheeler", VehicleCategory::FourWheeler);
    m.insert("four-wheeler", VehicleCategory::FourWheeler);
    m.insert("fourwheeler", VehicleCategory::FourWheeler);
    m.insert("4 wheeler", VehicleCategory::FourWheeler);
    m.insert("car", VehicleCategory::FourWheeler);
    m.insert("suv", VehicleCategory::FourWheeler);
    m.insert("sedan", VehicleCategory::FourWheeler);

    m
});

/// Resolve a free-text label to a category, case-insensitively
pub fn lookup_category(label: &str) -> Option<VehicleCategory> {
    let key = label.trim().to_lowercase();
    CATEGORY_ALIASES.get(key.as_str()).copied()
}

/// Long display name used in insight headlines
pub fn display_name(category: VehicleCategory) -> &'static str {
    match category {
        VehicleCategory::TwoWheeler => "Two Wheeler",
        VehicleCategory::ThreeWheeler => "Three Wheeler",
        VehicleCategory::FourWheeler => "Four Wheeler",
    }
}
