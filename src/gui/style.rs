use iced::{Background, Border, Color, Shadow, Theme};
use iced::widget::container::{Appearance, StyleSheet};

use crate::device::descriptor::ChargeColor;

/// Logical pixels per gauge unit; the gauge body is 56 units wide.
pub const GAUGE_SCALE: f32 = 4.0;

pub const GAUGE_HEIGHT: f32 = 100.0;

pub fn charge_color(color: ChargeColor) -> Color {
    let [r, g, b] = color.rgb();
    Color::from_rgb8(r, g, b)
}

/// The outline of the battery.
pub struct GaugeBodyStyleSheet;

impl StyleSheet for GaugeBodyStyleSheet {
    type Style = Theme;

    fn appearance(&self, _style: &Self::Style) -> Appearance {
        Appearance {
            text_color: None,
            background: Some(Background::Color(Color::WHITE)),
            border: Border {
                color: Color::BLACK,
                width: 3.0,
                radius: 6.0.into(),
            },
            shadow: Shadow::default(),
        }
    }
}

/// The filled part of the battery.
pub struct GaugeFillStyleSheet {
    pub color: Option<ChargeColor>,
}

impl StyleSheet for GaugeFillStyleSheet {
    type Style = Theme;

    fn appearance(&self, _style: &Self::Style) -> Appearance {
        Appearance {
            text_color: None,
            background: self.color.map(|color| Background::Color(charge_color(color))),
            border: Border {
                color: Color::TRANSPARENT,
                width: 0.0,
                radius: 3.0.into(),
            },
            shadow: Shadow::default(),
        }
    }
}
