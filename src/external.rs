//! External force ledger.
//!
//! Impacts, wind and scripted pushes are not integrated as forces. They add
//! to a decaying `external_velocity` accumulator that is blended on top of
//! the controller's own velocity each tick. The individual entries are
//! bookkeeping: they decide when the accumulator may be dropped and make the
//! active pushes visible for debugging.

use bevy::prelude::*;

use crate::config::ExternalForceConfig;

/// Source tag used for automatically injected impact impulses.
pub const IMPACT_SOURCE: &str = "impact";

/// A single recorded push.
#[derive(Reflect, Debug, Clone, PartialEq)]
pub struct ExternalForceEntry {
    pub force: Vec3,
    pub total_duration: f32,
    pub time_remaining: f32,
    pub persistent: bool,
    pub source: String,
    /// Share of the accumulator withdrawn when the entry expires or is
    /// removed. Zero for impulses, whose velocity only decays.
    pub contribution: Vec3,
    /// Ticks this entry has been through.
    pub ticks_active: u32,
}

impl ExternalForceEntry {
    /// Timer ran out and the entry has been blended at least once.
    pub fn is_expired(&self) -> bool {
        !self.persistent && self.time_remaining <= 0.0 && self.ticks_active > 1
    }
}

/// Per-entity external force state.
#[derive(Component, Reflect, Debug, Clone, Default)]
#[reflect(Component)]
pub struct ExternalForces {
    entries: Vec<ExternalForceEntry>,
    external_velocity: Vec3,
    last_impact_magnitude: f32,
    /// Contribution blended into the body velocity last tick.
    applied: Vec3,
}

impl ExternalForces {
    /// Push the entity with `force` for `duration` seconds.
    ///
    /// The force is clamped to the configured maximum magnitude and scaled by
    /// the configured gain before it reaches the accumulator. Its share is
    /// withdrawn again once the duration is over.
    pub fn apply_force(
        &mut self,
        force: Vec3,
        duration: f32,
        source: impl Into<String>,
        config: &ExternalForceConfig,
    ) {
        self.record(force, duration, false, true, source.into(), config);
    }

    /// Like [`apply_force`](Self::apply_force), but the entry never expires
    /// until removed with [`remove_source`](Self::remove_source).
    pub fn apply_persistent_force(
        &mut self,
        force: Vec3,
        source: impl Into<String>,
        config: &ExternalForceConfig,
    ) {
        self.record(force, 0.0, true, true, source.into(), config);
    }

    /// Instantaneous push. Also records the impact magnitude.
    ///
    /// The entry lives for `impulse_lifetime`, but the velocity it adds only
    /// fades through damping.
    pub fn apply_impulse(
        &mut self,
        force: Vec3,
        source: impl Into<String>,
        config: &ExternalForceConfig,
    ) {
        let accepted = self.record(
            force,
            config.impulse_lifetime,
            false,
            false,
            source.into(),
            config,
        );
        self.last_impact_magnitude = accepted.length();
    }

    fn record(
        &mut self,
        force: Vec3,
        duration: f32,
        persistent: bool,
        withdrawn_on_expiry: bool,
        source: String,
        config: &ExternalForceConfig,
    ) -> Vec3 {
        let accepted = force.clamp_length_max(config.max_force) * config.gain;
        if !accepted.is_finite() {
            return Vec3::ZERO;
        }
        self.external_velocity += accepted;
        let duration = duration.max(0.0);
        self.entries.push(ExternalForceEntry {
            force: accepted,
            total_duration: duration,
            time_remaining: duration,
            persistent,
            source,
            contribution: if withdrawn_on_expiry { accepted } else { Vec3::ZERO },
            ticks_active: 0,
        });
        accepted
    }

    /// Advance timers and decay the accumulator by one tick.
    pub fn tick(&mut self, dt: f32, config: &ExternalForceConfig) {
        let decay = config.damping.powf(dt);
        for entry in &mut self.entries {
            if !entry.persistent {
                entry.time_remaining -= dt;
            }
            entry.ticks_active = entry.ticks_active.saturating_add(1);
            entry.contribution *= decay;
        }
        self.external_velocity *= decay;

        let mut withdrawn = Vec3::ZERO;
        self.entries.retain(|entry| {
            let expired = entry.is_expired();
            if expired {
                withdrawn += entry.contribution;
            }
            !expired
        });
        self.external_velocity -= withdrawn;
        self.snap_below_cutoff(config);
    }

    fn snap_below_cutoff(&mut self, config: &ExternalForceConfig) {
        if self.external_velocity.length() < config.cutoff {
            self.external_velocity = Vec3::ZERO;
        }
    }

    /// Contribution to add to the controller velocity this tick.
    ///
    /// Reduced while grounded and again while the controller has directional
    /// input. Zero below the cutoff.
    pub fn blend(&self, grounded: bool, has_input: bool, config: &ExternalForceConfig) -> Vec3 {
        if self.external_velocity.length() < config.cutoff {
            return Vec3::ZERO;
        }
        let mut factor = 1.0;
        if grounded {
            factor *= config.grounded_blend;
        }
        if has_input {
            factor *= config.input_blend;
        }
        self.external_velocity * factor
    }

    /// Drop every entry from `source`, persistent ones included, and
    /// withdraw what the forces among them still contribute.
    pub fn remove_source(&mut self, source: &str) {
        let mut withdrawn = Vec3::ZERO;
        self.entries.retain(|entry| {
            let matches = entry.source == source;
            if matches {
                withdrawn += entry.contribution;
            }
            !matches
        });
        self.external_velocity -= withdrawn;
    }

    /// Forget every push and zero the accumulator.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.external_velocity = Vec3::ZERO;
        self.applied = Vec3::ZERO;
    }

    pub fn entries(&self) -> &[ExternalForceEntry] {
        &self.entries
    }

    pub fn external_velocity(&self) -> Vec3 {
        self.external_velocity
    }

    pub fn last_impact_magnitude(&self) -> f32 {
        self.last_impact_magnitude
    }

    pub(crate) fn applied(&self) -> Vec3 {
        self.applied
    }

    pub(crate) fn set_applied(&mut self, contribution: Vec3) {
        self.applied = contribution;
    }

    /// Overwrite the accumulator from a saved snapshot.
    ///
    /// The restored velocity belongs to no entry and only decays.
    pub(crate) fn restore(&mut self, external_velocity: Vec3, last_impact_magnitude: f32) {
        self.clear();
        self.last_impact_magnitude = last_impact_magnitude;
        if external_velocity.is_finite() {
            self.external_velocity = external_velocity;
        }
    }
}

/// Impulse to inject for a contact, if it is hard enough.
///
/// `separation` points from the other body toward this one and
/// `closing_velocity` is the other body's velocity relative to this one.
pub fn impact_impulse(
    separation: Vec3,
    closing_velocity: Vec3,
    config: &ExternalForceConfig,
) -> Option<Vec3> {
    let axis = separation.try_normalize()?;
    let closing_speed = closing_velocity.dot(axis);
    (closing_speed > config.impact_threshold).then(|| axis * closing_speed * config.impact_scale)
}

#[cfg(test)]
mod tests {
    use super::*;

    const DT: f32 = 1.0 / 60.0;

    #[test]
    fn force_is_clamped_and_scaled() {
        let config = ExternalForceConfig {
            gain: 2.0,
            ..default()
        };
        let mut forces = ExternalForces::default();
        forces.apply_force(Vec3::X * 500.0, 1.0, "wind", &config);
        assert!((forces.external_velocity().length() - config.max_force * 2.0).abs() < 1e-3);
        assert_eq!(forces.entries().len(), 1);
        assert_eq!(forces.entries()[0].source, "wind");
    }

    #[test]
    fn impulse_records_impact_magnitude() {
        let config = ExternalForceConfig::default();
        let mut forces = ExternalForces::default();
        forces.apply_impulse(Vec3::new(3.0, 4.0, 0.0), "blast", &config);
        assert!((forces.last_impact_magnitude() - 5.0).abs() < 1e-5);
        assert_eq!(forces.entries()[0].total_duration, config.impulse_lifetime);
    }

    #[test]
    fn accumulator_decays_exponentially() {
        let config = ExternalForceConfig::default();
        let mut forces = ExternalForces::default();
        forces.apply_force(Vec3::X * 10.0, 5.0, "push", &config);
        forces.tick(0.5, &config);
        let expected = 10.0 * config.damping.powf(0.5);
        assert!((forces.external_velocity().x - expected).abs() < 1e-4);
    }

    #[test]
    fn decays_to_zero_once_duration_elapses() {
        let config = ExternalForceConfig {
            // Slow damping so only expiry can zero it.
            damping: 0.9,
            ..default()
        };
        let mut forces = ExternalForces::default();
        let duration = 0.5;
        forces.apply_force(Vec3::Z * 20.0, duration, "push", &config);

        // One tick past the duration.
        let ticks = (duration / DT).ceil() as usize + 1;
        for _ in 0..ticks {
            forces.tick(DT, &config);
        }
        assert!(forces.external_velocity().length() < config.cutoff);
        assert!(forces.entries().is_empty());
    }

    #[test]
    fn impulse_outlives_its_entry_and_keeps_decaying() {
        let config = ExternalForceConfig::default();
        let mut forces = ExternalForces::default();
        forces.apply_impulse(Vec3::X * 40.0, "blast", &config);

        // Half a second, twice the impulse lifetime.
        for _ in 0..30 {
            forces.tick(DT, &config);
        }
        assert!(forces.entries().is_empty());
        let expected = 40.0 * config.damping.powf(30.0 * DT);
        assert!((forces.external_velocity().x - expected).abs() < 1e-3);

        // No single tick drops more than the damping removes.
        let before = forces.external_velocity().x;
        forces.tick(DT, &config);
        assert!((forces.external_velocity().x - before * config.damping.powf(DT)).abs() < 1e-4);
    }

    #[test]
    fn expiring_force_leaves_impulse_share_alone() {
        let config = ExternalForceConfig {
            damping: 0.9,
            ..default()
        };
        let mut forces = ExternalForces::default();
        forces.apply_force(Vec3::Z * 10.0, 0.1, "gust", &config);
        forces.apply_impulse(Vec3::X * 10.0, "blast", &config);
        for _ in 0..30 {
            forces.tick(DT, &config);
        }
        let velocity = forces.external_velocity();
        assert!(velocity.z.abs() < 1e-3);
        assert!((velocity.x - 10.0 * 0.9_f32.powf(30.0 * DT)).abs() < 1e-3);
    }

    #[test]
    fn zero_duration_force_is_blended_once() {
        let config = ExternalForceConfig::default();
        let mut forces = ExternalForces::default();
        forces.apply_force(Vec3::X * 20.0, 0.0, "kick", &config);

        forces.tick(DT, &config);
        let first = forces.blend(false, false, &config);
        assert!((first.x - 20.0 * config.damping.powf(DT)).abs() < 1e-3);
        assert_eq!(forces.entries().len(), 1);

        forces.tick(DT, &config);
        assert!(forces.entries().is_empty());
        assert_eq!(forces.blend(false, false, &config), Vec3::ZERO);
    }

    #[test]
    fn persistent_entries_survive_until_removed() {
        let config = ExternalForceConfig {
            damping: 0.9,
            ..default()
        };
        let mut forces = ExternalForces::default();
        forces.apply_persistent_force(Vec3::X * 5.0, "current", &config);
        for _ in 0..120 {
            forces.tick(DT, &config);
        }
        assert_eq!(forces.entries().len(), 1);
        assert!(forces.external_velocity().length() > config.cutoff);

        forces.remove_source("current");
        forces.tick(DT, &config);
        assert_eq!(forces.external_velocity(), Vec3::ZERO);
    }

    #[test]
    fn blend_is_reduced_by_ground_and_input() {
        let config = ExternalForceConfig::default();
        let mut forces = ExternalForces::default();
        forces.apply_force(Vec3::X * 10.0, 1.0, "push", &config);

        let airborne = forces.blend(false, false, &config);
        let grounded = forces.blend(true, false, &config);
        let fighting = forces.blend(true, true, &config);
        assert_eq!(airborne, Vec3::X * 10.0);
        assert!(grounded.length() < airborne.length());
        assert!(fighting.length() < grounded.length());
    }

    #[test]
    fn blend_below_cutoff_is_zero() {
        let config = ExternalForceConfig::default();
        let mut forces = ExternalForces::default();
        forces.apply_force(Vec3::X * 0.01, 1.0, "breeze", &config);
        assert_eq!(forces.blend(false, false, &config), Vec3::ZERO);
    }

    #[test]
    fn impact_needs_closing_speed_over_threshold() {
        let config = ExternalForceConfig::default();
        assert!(impact_impulse(Vec3::X, Vec3::X * 1.0, &config).is_none());
        assert!(impact_impulse(Vec3::X, Vec3::NEG_X * 10.0, &config).is_none());
        assert!(impact_impulse(Vec3::ZERO, Vec3::X * 10.0, &config).is_none());

        let impulse = impact_impulse(Vec3::X * 2.0, Vec3::X * 6.0, &config).unwrap();
        assert!((impulse - Vec3::X * 6.0 * config.impact_scale).length() < 1e-5);
    }

    #[test]
    fn restored_velocity_decays_without_entries() {
        let config = ExternalForceConfig::default();
        let mut forces = ExternalForces::default();
        forces.restore(Vec3::Y * 3.0, 7.0);
        forces.tick(DT, &config);
        assert!(forces.entries().is_empty());
        assert!((forces.external_velocity().y - 3.0 * config.damping.powf(DT)).abs() < 1e-4);
        assert_eq!(forces.last_impact_magnitude(), 7.0);
    }
}
