//! Background particle field.
//!
//! Three families of point lights share one capped population:
//!
//! - **Stars** twinkle in place; their alpha bounces between 0 and 1.
//! - **Embers** drift slowly upward, wrapping around the viewport, with an
//!   alpha that pulses by position and time.
//! - **Meteors** spawn near the top at random, fall, fade linearly, and are
//!   removed once faded or past the meteor floor.
//!
//! Stars and embers are seeded once and live for the whole session. Meteors
//! churn, keeping the population near its cap without any per-frame
//! bookkeeping beyond one random draw.

use glam::Vec2;
use rand::rngs::SmallRng;
use rand::Rng;

use crate::canvas::DrawList;
use crate::config::ParticleConfig;

/// Twinkle rate ceiling, alpha units per second.
const STAR_TWINKLE_SPEED: f32 = 3.0;
/// Ember drift ceiling per axis, pixels per second.
const EMBER_DRIFT: f32 = 12.0;
/// Constant upward bias of embers, pixels per second.
const EMBER_RISE: f32 = 6.0;
/// Meteor fall speed range, pixels per second.
const METEOR_SPEED: (f32, f32) = (12.0, 42.0);
/// Meteor fade, alpha units per second.
const METEOR_FADE: f32 = 0.3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParticleKind {
    Star,
    Ember,
    Meteor,
}

/// One point light.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Particle {
    pub id: u64,
    pub kind: ParticleKind,
    /// Position in pixels, before parallax.
    pub position: Vec2,
    /// Pixels per second.
    pub velocity: Vec2,
    /// Radius in pixels.
    pub size: f32,
    /// Opacity in `[0, 1]`.
    pub alpha: f32,
    /// Alpha change per second (stars and meteors).
    pub fade: f32,
}

/// Why a particle left the population.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemovalReason {
    Faded,
    OutOfBounds,
}

/// A particle as it was when it was removed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Removal {
    pub particle: Particle,
    pub reason: RemovalReason,
}

#[inline]
fn wrap(v: f32, extent: f32) -> f32 {
    if extent > 0.0 {
        v.rem_euclid(extent)
    } else {
        v
    }
}

#[inline]
fn wrap2(p: Vec2, viewport: Vec2) -> Vec2 {
    Vec2::new(wrap(p.x, viewport.x), wrap(p.y, viewport.y))
}

/// Capped population of stars, embers and meteors.
#[derive(Debug)]
pub struct ParticleSystem {
    config: ParticleConfig,
    particles: Vec<Particle>,
    removed: Vec<Removal>,
    viewport: Vec2,
    rng: SmallRng,
    next_id: u64,
}

impl ParticleSystem {
    /// Create the system and seed its stars and embers.
    pub fn new(config: &ParticleConfig, viewport: Vec2, rng: SmallRng) -> Self {
        let mut system = Self {
            config: config.clone(),
            particles: Vec::with_capacity(config.max_particles as usize),
            removed: Vec::new(),
            viewport,
            rng,
            next_id: 0,
        };
        for _ in 0..config.stars {
            let star = system.new_star();
            system.insert(star);
        }
        for _ in 0..config.embers {
            let ember = system.new_ember();
            system.insert(ember);
        }
        log::debug!(
            "Seeded {} stars and {} embers over {}x{}",
            config.stars,
            config.embers,
            viewport.x,
            viewport.y
        );
        system
    }

    /// Add a particle if the population cap allows it.
    fn insert(&mut self, mut particle: Particle) -> bool {
        if self.particles.len() >= self.config.max_particles as usize {
            return false;
        }
        particle.id = self.next_id;
        self.next_id += 1;
        self.particles.push(particle);
        true
    }

    fn random_point(&mut self) -> Vec2 {
        Vec2::new(
            self.rng.gen::<f32>() * self.viewport.x,
            self.rng.gen::<f32>() * self.viewport.y,
        )
    }

    fn new_star(&mut self) -> Particle {
        Particle {
            id: 0,
            kind: ParticleKind::Star,
            position: self.random_point(),
            velocity: Vec2::ZERO,
            size: self.rng.gen::<f32>() * 1.5,
            alpha: self.rng.gen(),
            fade: self.rng.gen::<f32>() * STAR_TWINKLE_SPEED,
        }
    }

    fn new_ember(&mut self) -> Particle {
        let vx = (self.rng.gen::<f32>() - 0.5) * EMBER_DRIFT;
        let vy = (self.rng.gen::<f32>() - 0.5) * EMBER_DRIFT - EMBER_RISE;
        Particle {
            id: 0,
            kind: ParticleKind::Ember,
            position: self.random_point(),
            velocity: Vec2::new(vx, vy),
            size: self.rng.gen::<f32>() * 2.0 + 1.0,
            alpha: 1.0,
            fade: 0.0,
        }
    }

    fn new_meteor(&mut self) -> Particle {
        let x = self.rng.gen::<f32>() * self.viewport.x;
        let y = self.rng.gen::<f32>() * self.viewport.y * 0.5;
        let speed = self.rng.gen_range(METEOR_SPEED.0..METEOR_SPEED.1);
        Particle {
            id: 0,
            kind: ParticleKind::Meteor,
            position: Vec2::new(x, y),
            velocity: Vec2::new(0.0, speed),
            size: self.rng.gen::<f32>() * 2.0 + 1.0,
            alpha: self.rng.gen::<f32>() * 0.5 + 0.5,
            fade: -METEOR_FADE,
        }
    }

    /// Advance every particle by `dt` seconds.
    ///
    /// `time` is the clock's elapsed seconds (drives ember pulsing) and
    /// `viewport` the current size in pixels.
    ///
    /// A change of `viewport` stretches stars and embers over the new extent.
    pub fn step(&mut self, dt: f32, time: f32, viewport: Vec2) {
        if viewport != self.viewport {
            self.rescale_ambient(viewport);
        }
        self.viewport = viewport;
        self.removed.clear();

        let floor = viewport.y * self.config.meteor_floor;
        for p in &mut self.particles {
            match p.kind {
                ParticleKind::Star => {
                    p.alpha += p.fade * dt;
                    if p.alpha > 1.0 || p.alpha < 0.0 {
                        p.fade = -p.fade;
                        p.alpha = p.alpha.clamp(0.0, 1.0);
                    }
                    p.position = wrap2(p.position, viewport);
                }
                ParticleKind::Ember => {
                    p.position = wrap2(p.position + p.velocity * dt, viewport);
                    p.alpha = ((time + p.position.x).sin() + 0.5).clamp(0.0, 1.0);
                }
                ParticleKind::Meteor => {
                    p.position += p.velocity * dt;
                    p.alpha += p.fade * dt;
                }
            }
        }

        let removed = &mut self.removed;
        self.particles.retain(|p| {
            if p.kind != ParticleKind::Meteor {
                return true;
            }
            let reason = if p.position.y > floor {
                RemovalReason::OutOfBounds
            } else if p.alpha <= 0.0 {
                RemovalReason::Faded
            } else {
                return true;
            };
            removed.push(Removal {
                particle: *p,
                reason,
            });
            false
        });

        if self.count(ParticleKind::Meteor) < self.config.max_meteors as usize
            && self.rng.gen::<f32>() < self.config.meteor_spawn_chance
        {
            let meteor = self.new_meteor();
            self.insert(meteor);
        }
    }

    fn rescale_ambient(&mut self, viewport: Vec2) {
        let old = self.viewport;
        if old.x <= 0.0 || old.y <= 0.0 || viewport.x <= 0.0 || viewport.y <= 0.0 {
            return;
        }
        let scale = viewport / old;
        for p in &mut self.particles {
            if p.kind != ParticleKind::Meteor {
                p.position *= scale;
            }
        }
        log::debug!(
            "Rescaled ambient particles from {}x{} to {}x{}",
            old.x,
            old.y,
            viewport.x,
            viewport.y
        );
    }

    /// Draw every particle with a tilt-scaled parallax offset.
    ///
    /// Paint state is restored afterwards.
    pub fn render(&self, canvas: &mut DrawList, tilt: Vec2) {
        canvas.save();
        for p in &self.particles {
            let (depth, color) = match p.kind {
                ParticleKind::Star => (self.config.star_depth, self.config.star_color),
                ParticleKind::Ember => (self.config.ember_depth, self.config.ember_color),
                ParticleKind::Meteor => (self.config.meteor_depth, self.config.meteor_color),
            };
            let offset = -tilt * depth;
            let center = match p.kind {
                ParticleKind::Meteor => p.position + offset,
                _ => wrap2(p.position + offset, self.viewport),
            };
            canvas.set_global_alpha(p.alpha);
            canvas.fill_circle(center, p.size, color);
        }
        canvas.restore();
    }

    pub fn particles(&self) -> &[Particle] {
        &self.particles
    }

    pub fn len(&self) -> usize {
        self.particles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.particles.is_empty()
    }

    pub fn count(&self, kind: ParticleKind) -> usize {
        self.particles.iter().filter(|p| p.kind == kind).count()
    }

    pub fn capacity(&self) -> usize {
        self.config.max_particles as usize
    }

    /// Particles removed during the most recent [`step`](Self::step).
    pub fn recently_removed(&self) -> &[Removal] {
        &self.removed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    const VIEWPORT: Vec2 = Vec2::new(800.0, 600.0);

    fn system(config: ParticleConfig) -> ParticleSystem {
        ParticleSystem::new(&config, VIEWPORT, SmallRng::seed_from_u64(42))
    }

    fn empty_config() -> ParticleConfig {
        ParticleConfig {
            stars: 0,
            embers: 0,
            max_meteors: 0,
            meteor_spawn_chance: 0.0,
            ..ParticleConfig::default()
        }
    }

    #[test]
    fn test_seeds_stars_and_embers() {
        let particles = system(ParticleConfig::default());
        assert_eq!(particles.count(ParticleKind::Star), 400);
        assert_eq!(particles.count(ParticleKind::Ember), 50);
        assert_eq!(particles.count(ParticleKind::Meteor), 0);
    }

    #[test]
    fn test_population_never_exceeds_cap() {
        let config = ParticleConfig {
            stars: 20,
            embers: 5,
            max_meteors: 1000,
            max_particles: 40,
            meteor_spawn_chance: 1.0,
            ..ParticleConfig::default()
        };
        let mut particles = system(config);
        for frame in 0..3000 {
            particles.step(1.0 / 60.0, frame as f32 / 60.0, VIEWPORT);
            assert!(particles.len() <= 40);
        }
        // Meteors churn, so the population hovers just under the cap
        assert!(particles.len() >= 35);
    }

    #[test]
    fn test_meteor_cap() {
        let config = ParticleConfig {
            max_meteors: 3,
            meteor_spawn_chance: 1.0,
            ..ParticleConfig::default()
        };
        let mut particles = system(config);
        for frame in 0..500 {
            particles.step(1.0 / 60.0, frame as f32 / 60.0, VIEWPORT);
            assert!(particles.count(ParticleKind::Meteor) <= 3);
        }
    }

    #[test]
    fn test_removed_particles_are_faded_or_out_of_bounds() {
        let mut particles = system(ParticleConfig::default());
        let floor = VIEWPORT.y * ParticleConfig::default().meteor_floor;
        let mut total_removed = 0;
        for frame in 0..2000 {
            particles.step(1.0 / 60.0, frame as f32 / 60.0, VIEWPORT);
            for removal in particles.recently_removed() {
                total_removed += 1;
                match removal.reason {
                    RemovalReason::Faded => assert!(removal.particle.alpha <= 0.0),
                    RemovalReason::OutOfBounds => assert!(removal.particle.position.y > floor),
                }
                assert!(particles.particles().iter().all(|p| p.id != removal.particle.id));
            }
        }
        assert!(total_removed > 0);
    }

    #[test]
    fn test_embers_wrap_inside_viewport() {
        let mut particles = system(ParticleConfig::default());
        for frame in 0..600 {
            particles.step(0.1, frame as f32 * 0.1, VIEWPORT);
        }
        for p in particles.particles() {
            if p.kind == ParticleKind::Ember {
                assert!(p.position.x >= 0.0 && p.position.x <= VIEWPORT.x);
                assert!(p.position.y >= 0.0 && p.position.y <= VIEWPORT.y);
                assert!((0.0..=1.0).contains(&p.alpha));
            }
        }
    }

    #[test]
    fn test_star_twinkle_bounces() {
        let mut particles = system(empty_config());
        particles.insert(Particle {
            id: 0,
            kind: ParticleKind::Star,
            position: Vec2::new(100.0, 100.0),
            velocity: Vec2::ZERO,
            size: 1.0,
            alpha: 0.95,
            fade: 3.0,
        });
        particles.step(0.05, 0.0, VIEWPORT);
        let star = particles.particles()[0];
        assert_eq!(star.alpha, 1.0);
        assert!(star.fade < 0.0);
        particles.step(0.05, 0.05, VIEWPORT);
        assert!(particles.particles()[0].alpha < star.alpha);
    }

    #[test]
    fn test_nearer_layers_move_more() {
        let mut particles = system(empty_config());
        for kind in [ParticleKind::Star, ParticleKind::Ember] {
            particles.insert(Particle {
                id: 0,
                kind,
                position: Vec2::new(400.0, 300.0),
                velocity: Vec2::ZERO,
                size: 2.0,
                alpha: 1.0,
                fade: 0.0,
            });
        }

        let centers = |tilt: Vec2| {
            let mut canvas = DrawList::new();
            particles.render(&mut canvas, tilt);
            let per_circle = canvas.vertices().len() / 2;
            (
                Vec2::from(canvas.vertices()[0].position),
                Vec2::from(canvas.vertices()[per_circle].position),
            )
        };

        let (star_rest, ember_rest) = centers(Vec2::ZERO);
        let (star_tilted, ember_tilted) = centers(Vec2::new(1.0, 0.0));
        let star_shift = star_rest.distance(star_tilted);
        let ember_shift = ember_rest.distance(ember_tilted);
        assert!((star_shift - 25.0).abs() < 1e-3);
        assert!((ember_shift - 60.0).abs() < 1e-3);
        assert!(star_tilted.x < star_rest.x);
    }

    #[test]
    fn test_render_restores_global_alpha() {
        let mut particles = system(ParticleConfig::default());
        particles.step(1.0 / 60.0, 0.0, VIEWPORT);
        let mut canvas = DrawList::new();
        particles.render(&mut canvas, Vec2::new(0.3, -0.2));
        assert!(!canvas.is_empty());
        assert_eq!(canvas.global_alpha(), 1.0);
    }

    #[test]
    fn test_star_alpha_stays_in_unit_range() {
        let mut particles = system(ParticleConfig {
            embers: 0,
            max_meteors: 0,
            ..ParticleConfig::default()
        });
        for frame in 0..1200 {
            particles.step(1.0 / 30.0, frame as f32 / 30.0, VIEWPORT);
            assert!(particles
                .particles()
                .iter()
                .all(|p| (0.0..=1.0).contains(&p.alpha)));
        }
    }

    #[test]
    fn test_resize_keeps_ambient_particles_inside() {
        let mut particles = system(ParticleConfig::default());
        let small = Vec2::new(200.0, 100.0);
        particles.step(1.0 / 60.0, 0.0, small);
        for p in particles.particles() {
            if p.kind != ParticleKind::Meteor {
                assert!(p.position.x <= small.x && p.position.y <= small.y);
            }
        }
    }

    fn ambient_share_beyond(particles: &ParticleSystem, x: f32) -> f32 {
        let ambient: Vec<_> = particles
            .particles()
            .iter()
            .filter(|p| p.kind != ParticleKind::Meteor)
            .collect();
        let beyond = ambient.iter().filter(|p| p.position.x > x).count();
        beyond as f32 / ambient.len() as f32
    }

    #[test]
    fn test_growing_viewport_spreads_ambient_particles() {
        let portrait = Vec2::new(375.0, 812.0);
        let landscape = Vec2::new(1024.0, 768.0);
        let mut particles =
            ParticleSystem::new(&ParticleConfig::default(), portrait, SmallRng::seed_from_u64(9));
        particles.step(1.0 / 60.0, 0.0, portrait);
        for frame in 1..600 {
            particles.step(1.0 / 60.0, frame as f32 / 60.0, landscape);
        }
        // Uniform coverage puts roughly 60% beyond x = 400
        assert!(ambient_share_beyond(&particles, 400.0) > 0.4);
        assert!(ambient_share_beyond(&particles, 800.0) > 0.1);
    }

    #[test]
    fn test_shrink_then_grow_restores_spread() {
        let mut particles = system(ParticleConfig::default());
        particles.step(1.0 / 60.0, 0.0, Vec2::new(200.0, 150.0));
        particles.step(1.0 / 60.0, 1.0 / 60.0, VIEWPORT);
        assert!(ambient_share_beyond(&particles, VIEWPORT.x / 2.0) > 0.3);
    }
}
