use glam::Vec3;

/// Inverse-distance falloff coefficients.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Attenuation {
    pub constant: f32,
    pub linear: f32,
    pub quadratic: f32,
}

impl Attenuation {
    pub const fn new(constant: f32, linear: f32, quadratic: f32) -> Self {
        Self {
            constant,
            linear,
            quadratic,
        }
    }
}

/// Ambient/diffuse/specular triple uploaded for one light each frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Phong {
    pub ambient: Vec3,
    pub diffuse: Vec3,
    pub specular: Vec3,
}

impl Phong {
    pub const ZERO: Self = Self {
        ambient: Vec3::ZERO,
        diffuse: Vec3::ZERO,
        specular: Vec3::ZERO,
    };
}

/// Color curve of a point light. The formulas are fixed display behavior
/// carried over from the scene's original tuning, one per light.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pulse {
    /// Red channel swings with sin(t); magenta-leaning base.
    RedSine,
    /// Green channel swings with cos(t); cyan-leaning base.
    GreenCosine,
}

impl Pulse {
    pub fn color(self, elapsed: f32) -> Vec3 {
        match self {
            Pulse::RedSine => Vec3::new(
                184.0 / 255.0 * elapsed.sin(),
                57.0 / 255.0,
                153.0 / 255.0,
            ),
            Pulse::GreenCosine => Vec3::new(
                96.0 / 255.0,
                159.0 / 255.0 * elapsed.cos(),
                201.0 / 255.0,
            ),
        }
    }
}

/// Point light with a time-varying color.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointLight {
    pub position: Vec3,
    pub pulse: Pulse,
    pub attenuation: Attenuation,
}

/// Gain applied to bulb stand-in meshes so they read as emitters.
pub const BULB_GAIN: f32 = 2.0;

impl PointLight {
    pub fn color(&self, elapsed: f32) -> Vec3 {
        self.pulse.color(elapsed)
    }

    /// Per-frame shading triple, derived from scratch with no accumulation.
    pub fn phong(&self, elapsed: f32) -> Phong {
        let color = self.color(elapsed);
        Phong {
            ambient: color * 0.2,
            diffuse: color,
            specular: color,
        }
    }

    pub fn bulb_color(&self, elapsed: f32) -> Vec3 {
        self.color(elapsed) * BULB_GAIN
    }
}

/// Shading profile of a spot light.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpotProfile {
    /// Static ceiling fixture.
    Ceiling,
    /// Glow of the projection screen; diffuse pulses with sin(4t).
    Screen,
}

/// Spot light with a fixed cone and either a static or animated profile.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpotLight {
    pub position: Vec3,
    pub direction: Vec3,
    pub inner_cutoff_deg: f32,
    pub outer_cutoff_deg: f32,
    pub attenuation: Attenuation,
    pub color: Vec3,
    pub profile: SpotProfile,
}

impl SpotLight {
    pub fn phong(&self, elapsed: f32) -> Phong {
        match self.profile {
            SpotProfile::Ceiling => Phong {
                ambient: self.color * 0.2,
                diffuse: self.color * 0.5,
                specular: self.color * 0.8,
            },
            SpotProfile::Screen => Phong {
                ambient: self.color * 0.2,
                diffuse: self.color * (elapsed * 4.0).sin() + self.color * 0.5,
                specular: self.color * 0.8,
            },
        }
    }

    /// Ceiling spots draw a small bulb cube; the screen light has a mesh of
    /// its own in the scene and draws none.
    pub fn bulb_color(&self) -> Option<Vec3> {
        match self.profile {
            SpotProfile::Ceiling => Some(self.color),
            SpotProfile::Screen => None,
        }
    }
}

/// Directional fill light with a user toggle. Disabling zeroes the emitted
/// triple instead of removing the light, so the uniform stream stays
/// identical frame to frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DirectionalLight {
    pub direction: Vec3,
    pub color: Vec3,
    pub enabled: bool,
}

impl DirectionalLight {
    pub fn phong(&self) -> Phong {
        if !self.enabled {
            return Phong::ZERO;
        }
        Phong {
            ambient: self.color * 0.2,
            diffuse: self.color * 0.9,
            specular: self.color * 0.8,
        }
    }
}

/// A light record of any kind.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Light {
    Point(PointLight),
    Spot(SpotLight),
    Directional(DirectionalLight),
}

/// The scene's fixed light layout as one indexed collection.
///
/// Uniform array indices follow insertion order within each kind, so the
/// order of `lights` is part of the shader contract.
#[derive(Debug, Clone, PartialEq)]
pub struct LightRig {
    lights: Vec<Light>,
}

fn rgb(r: f32, g: f32, b: f32) -> Vec3 {
    Vec3::new(r / 255.0, g / 255.0, b / 255.0)
}

const CEILING_SPOT_DIRECTION: Vec3 = Vec3::new(0.0, -11.0, -5.0);
const CEILING_SPOT_ATTENUATION: Attenuation = Attenuation::new(1.0, 0.09, 0.032);
const POINT_ATTENUATION: Attenuation = Attenuation::new(1.0, 0.014, 0.0007);

impl LightRig {
    /// The night-pavilion layout: two pulsing point lights at the entrance,
    /// four ceiling spots, the screen glow, and a cold directional fill.
    pub fn night_pavilion() -> Self {
        let ceiling_color = rgb(215.0, 237.0, 244.0);
        let ceiling = |x: f32| SpotLight {
            position: Vec3::new(x, 11.5, -8.2),
            direction: CEILING_SPOT_DIRECTION,
            inner_cutoff_deg: 10.5,
            outer_cutoff_deg: 30.5,
            attenuation: CEILING_SPOT_ATTENUATION,
            color: ceiling_color,
            profile: SpotProfile::Ceiling,
        };

        let lights = vec![
            Light::Point(PointLight {
                position: Vec3::new(-28.49, 0.0, 44.27),
                pulse: Pulse::RedSine,
                attenuation: POINT_ATTENUATION,
            }),
            Light::Point(PointLight {
                position: Vec3::new(28.49, 0.0, 44.27),
                pulse: Pulse::GreenCosine,
                attenuation: POINT_ATTENUATION,
            }),
            Light::Spot(ceiling(-19.6)),
            Light::Spot(ceiling(-10.7)),
            Light::Spot(ceiling(19.6)),
            Light::Spot(ceiling(10.7)),
            Light::Spot(SpotLight {
                position: Vec3::new(0.0, 6.54, -10.0),
                direction: Vec3::new(0.0, -7.64, 30.0),
                inner_cutoff_deg: 20.0,
                outer_cutoff_deg: 80.0,
                attenuation: Attenuation::new(1.0, 0.022, 0.0019),
                color: rgb(164.0, 80.0, 1.0),
                profile: SpotProfile::Screen,
            }),
            Light::Directional(DirectionalLight {
                direction: Vec3::new(-50.0, -52.0, -316.0),
                color: rgb(44.0, 104.0, 195.0),
                enabled: true,
            }),
        ];
        Self { lights }
    }

    pub fn points(&self) -> impl Iterator<Item = &PointLight> {
        self.lights.iter().filter_map(|light| match light {
            Light::Point(point) => Some(point),
            _ => None,
        })
    }

    pub fn spots(&self) -> impl Iterator<Item = &SpotLight> {
        self.lights.iter().filter_map(|light| match light {
            Light::Spot(spot) => Some(spot),
            _ => None,
        })
    }

    pub fn directional(&self) -> Option<&DirectionalLight> {
        self.lights.iter().find_map(|light| match light {
            Light::Directional(directional) => Some(directional),
            _ => None,
        })
    }

    pub fn set_directional_enabled(&mut self, enabled: bool) {
        for light in &mut self.lights {
            if let Light::Directional(directional) = light {
                directional.enabled = enabled;
            }
        }
    }

    pub fn directional_enabled(&self) -> bool {
        self.directional().map_or(false, |light| light.enabled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::f32::consts::PI;

    #[test]
    fn night_pavilion_has_the_fixed_layout() {
        let rig = LightRig::night_pavilion();
        assert_eq!(rig.points().count(), 2);
        assert_eq!(rig.spots().count(), 5);
        assert!(rig.directional().is_some());
        assert_eq!(
            rig.spots()
                .filter(|spot| spot.profile == SpotProfile::Screen)
                .count(),
            1
        );
    }

    #[test]
    fn point_curves_at_time_zero() {
        let rig = LightRig::night_pavilion();
        let colors: Vec<Vec3> = rig.points().map(|p| p.color(0.0)).collect();
        assert_relative_eq!(colors[0].x, 0.0, epsilon = 1e-6);
        assert_relative_eq!(colors[0].y, 57.0 / 255.0, epsilon = 1e-6);
        assert_relative_eq!(colors[0].z, 153.0 / 255.0, epsilon = 1e-6);
        assert_relative_eq!(colors[1].x, 96.0 / 255.0, epsilon = 1e-6);
        assert_relative_eq!(colors[1].y, 159.0 / 255.0, epsilon = 1e-6);
        assert_relative_eq!(colors[1].z, 201.0 / 255.0, epsilon = 1e-6);
    }

    #[test]
    fn point_phong_is_fixed_fractions_of_color() {
        let rig = LightRig::night_pavilion();
        let light = rig.points().next().unwrap();
        let phong = light.phong(1.3);
        let color = light.color(1.3);
        assert_relative_eq!(phong.ambient.x, color.x * 0.2, epsilon = 1e-6);
        assert_eq!(phong.diffuse, color);
        assert_eq!(phong.specular, color);
    }

    #[test]
    fn screen_diffuse_follows_the_sine_modulation() {
        let rig = LightRig::night_pavilion();
        let screen = rig
            .spots()
            .find(|spot| spot.profile == SpotProfile::Screen)
            .unwrap();
        let color = screen.color;

        let at_zero = screen.phong(0.0).diffuse;
        assert_relative_eq!(at_zero.x, color.x * 0.5, epsilon = 1e-6);
        assert_relative_eq!(at_zero.y, color.y * 0.5, epsilon = 1e-6);
        assert_relative_eq!(at_zero.z, color.z * 0.5, epsilon = 1e-6);

        // 4t = pi/2, so sin peaks and diffuse reaches 1.5x the base color.
        let at_peak = screen.phong(PI / 8.0).diffuse;
        assert_relative_eq!(at_peak.x, color.x * 1.5, epsilon = 1e-5);
        assert_relative_eq!(at_peak.y, color.y * 1.5, epsilon = 1e-5);
        assert_relative_eq!(at_peak.z, color.z * 1.5, epsilon = 1e-5);
    }

    #[test]
    fn directional_toggle_round_trips() {
        let mut rig = LightRig::night_pavilion();
        let before = rig.directional().unwrap().phong();
        rig.set_directional_enabled(false);
        assert_eq!(rig.directional().unwrap().phong(), Phong::ZERO);
        rig.set_directional_enabled(true);
        assert_eq!(rig.directional().unwrap().phong(), before);
    }

    #[test]
    fn only_ceiling_spots_draw_bulbs() {
        let rig = LightRig::night_pavilion();
        let bulbs: Vec<_> = rig.spots().filter_map(|spot| spot.bulb_color()).collect();
        assert_eq!(bulbs.len(), 4);
    }

    #[test]
    fn point_bulbs_are_boosted() {
        let rig = LightRig::night_pavilion();
        let light = rig.points().next().unwrap();
        assert_eq!(light.bulb_color(2.0), light.color(2.0) * 2.0);
    }
}
