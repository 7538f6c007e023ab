//! 桁条与面板上持久化的工程属性。

use std::f64::consts::PI;

use spm_core::units::{Length, Stress};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CrossSection {
    pub width: Length,
    pub height: Length,
}

impl CrossSection {
    pub fn new(width: f64, height: f64) -> Self {
        Self {
            width: Length(width),
            height: Length(height),
        }
    }

    /// 截面面积（mm²）。
    pub fn area(&self) -> f64 {
        self.width.millimeters() * self.height.millimeters()
    }
}

impl Default for CrossSection {
    fn default() -> Self {
        Self::new(100.0, 100.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Steel {
    pub yield_stress: Stress,
    pub elastic_modulus: Stress,
}

impl Steel {
    pub fn new(yield_stress: f64, elastic_modulus: f64) -> Self {
        Self {
            yield_stress: Stress(yield_stress),
            elastic_modulus: Stress(elastic_modulus),
        }
    }

    pub fn yield_strain(&self) -> f64 {
        self.yield_stress.megapascals() / self.elastic_modulus.megapascals()
    }
}

impl Default for Steel {
    fn default() -> Self {
        Self::new(500.0, 210_000.0)
    }
}

/// 桁条纵向配筋。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UniaxialReinforcement {
    pub number_of_bars: i32,
    pub bar_diameter: Length,
    pub steel: Steel,
}

impl UniaxialReinforcement {
    pub fn new(number_of_bars: i32, bar_diameter: f64, steel: Steel) -> Self {
        Self {
            number_of_bars,
            bar_diameter: Length(bar_diameter),
            steel,
        }
    }

    /// 钢筋总面积（mm²）。
    pub fn area(&self) -> f64 {
        let diameter = self.bar_diameter.millimeters();
        f64::from(self.number_of_bars) * PI * diameter * diameter / 4.0
    }
}

/// 面板单方向的分布配筋。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WebReinforcementDirection {
    pub bar_diameter: Length,
    pub spacing: Length,
    pub steel: Steel,
}

impl WebReinforcementDirection {
    pub fn new(bar_diameter: f64, spacing: f64, steel: Steel) -> Self {
        Self {
            bar_diameter: Length(bar_diameter),
            spacing: Length(spacing),
            steel,
        }
    }

    /// 双层布置时的配筋率。
    pub fn ratio(&self, width: Length) -> f64 {
        let diameter = self.bar_diameter.millimeters();
        let spacing = self.spacing.millimeters();
        let width = width.millimeters();
        if spacing <= 0.0 || width <= 0.0 {
            return 0.0;
        }
        0.5 * PI * diameter * diameter / (spacing * width)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct WebReinforcement {
    pub x: Option<WebReinforcementDirection>,
    pub y: Option<WebReinforcementDirection>,
}

impl WebReinforcement {
    pub fn is_empty(&self) -> bool {
        self.x.is_none() && self.y.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reinforcement_area_counts_every_bar() {
        let reinforcement = UniaxialReinforcement::new(2, 10.0, Steel::default());
        assert!((reinforcement.area() - 157.079_632_679).abs() < 1e-6);
    }

    #[test]
    fn web_ratio_is_zero_for_degenerate_spacing() {
        let direction = WebReinforcementDirection::new(8.0, 0.0, Steel::default());
        assert_eq!(direction.ratio(Length(100.0)), 0.0);
        let direction = WebReinforcementDirection::new(8.0, 100.0, Steel::default());
        assert!((direction.ratio(Length(100.0)) - 0.010_053).abs() < 1e-6);
    }
}
