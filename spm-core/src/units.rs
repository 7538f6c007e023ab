//! 带单位的物理量。
//!
//! 内部统一以 mm / N / MPa 储存，只在对象与图元的边界（例如力标注文字）
//! 按 [`UnitSettings`] 换算为显示单位。

use serde::{Deserialize, Serialize};

/// 长度，单位 mm。
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Length(pub f64);

/// 力，单位 N。
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Force(pub f64);

/// 应力，单位 MPa。
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Stress(pub f64);

impl Length {
    #[inline]
    pub fn millimeters(self) -> f64 {
        self.0
    }

    #[inline]
    pub fn approx_eq(self, other: Length, tolerance: f64) -> bool {
        (self.0 - other.0).abs() <= tolerance
    }
}

impl Force {
    #[inline]
    pub fn newtons(self) -> f64 {
        self.0
    }

    #[inline]
    pub fn is_zero(self, tolerance: f64) -> bool {
        self.0.abs() <= tolerance
    }
}

impl Stress {
    #[inline]
    pub fn megapascals(self) -> f64 {
        self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum LengthUnit {
    #[default]
    #[serde(rename = "mm")]
    Millimeter,
    #[serde(rename = "cm")]
    Centimeter,
    #[serde(rename = "m")]
    Meter,
}

impl LengthUnit {
    #[inline]
    fn millimeters_per_unit(self) -> f64 {
        match self {
            LengthUnit::Millimeter => 1.0,
            LengthUnit::Centimeter => 10.0,
            LengthUnit::Meter => 1000.0,
        }
    }

    /// 把图形单位下的长度换算为内部长度。
    #[inline]
    pub fn to_length(self, drawing_value: f64) -> Length {
        Length(drawing_value * self.millimeters_per_unit())
    }

    #[inline]
    pub fn from_length(self, length: Length) -> f64 {
        length.0 / self.millimeters_per_unit()
    }

    pub fn symbol(self) -> &'static str {
        match self {
            LengthUnit::Millimeter => "mm",
            LengthUnit::Centimeter => "cm",
            LengthUnit::Meter => "m",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ForceUnit {
    #[serde(rename = "N")]
    Newton,
    #[default]
    #[serde(rename = "kN")]
    Kilonewton,
}

impl ForceUnit {
    #[inline]
    fn newtons_per_unit(self) -> f64 {
        match self {
            ForceUnit::Newton => 1.0,
            ForceUnit::Kilonewton => 1000.0,
        }
    }

    #[inline]
    pub fn to_force(self, display_value: f64) -> Force {
        Force(display_value * self.newtons_per_unit())
    }

    #[inline]
    pub fn from_force(self, force: Force) -> f64 {
        force.0 / self.newtons_per_unit()
    }

    pub fn symbol(self) -> &'static str {
        match self {
            ForceUnit::Newton => "N",
            ForceUnit::Kilonewton => "kN",
        }
    }
}

/// 当前图纸的单位设置。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct UnitSettings {
    #[serde(default)]
    pub length: LengthUnit,
    #[serde(default)]
    pub force: ForceUnit,
}

impl UnitSettings {
    /// 力的显示文本（绝对值，两位小数）。
    pub fn format_force(&self, force: Force) -> String {
        format!(
            "{:.2} {}",
            self.force.from_force(force).abs(),
            self.force.symbol()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn length_conversion_round_trips() {
        let length = LengthUnit::Meter.to_length(2.5);
        assert!((length.millimeters() - 2500.0).abs() < 1e-9);
        assert!((LengthUnit::Centimeter.from_length(length) - 250.0).abs() < 1e-9);
    }

    #[test]
    fn force_label_uses_display_unit() {
        let settings = UnitSettings::default();
        assert_eq!(settings.format_force(Force(-12_500.0)), "12.50 kN");
        let newtons = UnitSettings {
            force: ForceUnit::Newton,
            ..UnitSettings::default()
        };
        assert_eq!(newtons.format_force(Force(300.0)), "300.00 N");
    }
}
