//! Keyboard driven vehicle movement and the vehicle roster.

use std::collections::HashMap;

use crate::{
    config::{KeyBindings, VehicleConfig, VehicleEntry},
    data_structures::{instance::Transform, scene_registry::MemberId},
};

/// Four independent flags, set on key down and cleared on key up.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MovementState {
    pub forward: bool,
    pub backward: bool,
    pub left: bool,
    pub right: bool,
}

#[derive(Clone, Debug)]
pub struct VehicleController {
    pub step: f32,
    pub turn: f32,
    pub bindings: KeyBindings,
    pub movement: MovementState,
}

impl VehicleController {
    pub fn new(cfg: &VehicleConfig) -> Self {
        Self {
            step: cfg.step,
            turn: cfg.turn,
            bindings: cfg.bindings.clone(),
            movement: MovementState::default(),
        }
    }

    /// Updates the flag bound to `key`. Returns false for unbound keys.
    pub fn key(&mut self, key: &str, pressed: bool) -> bool {
        let b = &self.bindings;
        let flag = if key == b.forward {
            &mut self.movement.forward
        } else if key == b.backward {
            &mut self.movement.backward
        } else if key == b.left {
            &mut self.movement.left
        } else if key == b.right {
            &mut self.movement.right
        } else {
            return false;
        };
        *flag = pressed;
        true
    }

    /// One frame of movement. Forward moves along local -Z.
    pub fn apply(&self, transform: &mut Transform) {
        if self.movement.forward {
            transform.translate_z(-self.step);
        }
        if self.movement.backward {
            transform.translate_z(self.step);
        }
        if self.movement.left {
            transform.add_yaw(self.turn);
        }
        if self.movement.right {
            transform.add_yaw(-self.turn);
        }
    }
}

/// Which vehicles exist, which have loaded, and which one is driven.
#[derive(Clone, Debug, Default)]
pub struct VehicleRoster {
    entries: Vec<VehicleEntry>,
    loaded: HashMap<String, MemberId>,
    active: Option<MemberId>,
}

impl VehicleRoster {
    pub fn new(entries: Vec<VehicleEntry>) -> Self {
        Self {
            entries,
            ..Default::default()
        }
    }

    pub fn active(&self) -> Option<MemberId> {
        self.active
    }

    pub fn is_vehicle(&self, name: &str) -> bool {
        self.entries.iter().any(|e| e.name == name)
    }

    /// Records a loaded vehicle. The first vehicle listed is driven as soon
    /// as it loads unless another one was switched to already.
    pub fn bind(&mut self, name: &str, id: MemberId) {
        if !self.is_vehicle(name) {
            return;
        }
        self.loaded.insert(name.to_string(), id);
        let listed_first = self.entries.first().is_some_and(|e| e.name == name);
        if listed_first && self.active.is_none() {
            log::info!("driving {}", name);
            self.active = Some(id);
        }
    }

    /// Handles a switch key. Returns the notification text when the active
    /// vehicle changed; an unbound key or an unloaded vehicle changes nothing.
    pub fn switch(&mut self, key: &str) -> Option<String> {
        let entry = self.entries.iter().find(|e| e.key == key)?;
        match self.loaded.get(&entry.name) {
            Some(&id) => {
                self.active = Some(id);
                log::info!("switched to vehicle {}", entry.name);
                Some(format!("Now driving: {}", entry.name))
            }
            None => {
                log::info!("vehicle {} has not loaded yet", entry.name);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn controller() -> VehicleController {
        VehicleController::new(&VehicleConfig::default())
    }

    #[test]
    fn key_up_clears_only_its_flag() {
        let mut c = controller();
        assert!(c.key("s", true));
        assert!(c.key("a", true));
        assert!(c.key("s", false));
        assert_eq!(
            c.movement,
            MovementState {
                left: true,
                ..Default::default()
            }
        );
        assert!(!c.key("x", true));
    }

    #[test]
    fn turning_changes_yaw_only() {
        let mut c = controller();
        c.key("a", true);
        let mut t = Transform::new();
        c.apply(&mut t);
        assert!((t.yaw() - 0.04).abs() < 1e-6);
        assert_eq!(t.position, cgmath::Vector3::new(0.0, 0.0, 0.0));
        c.key("a", false);
        c.key("d", true);
        c.apply(&mut t);
        assert!(t.yaw().abs() < 1e-6);
    }

    fn roster() -> VehicleRoster {
        VehicleRoster::new(vec![
            VehicleEntry {
                name: "truck".into(),
                key: "3".into(),
            },
            VehicleEntry {
                name: "humvee".into(),
                key: "4".into(),
            },
        ])
    }

    #[test]
    fn first_listed_vehicle_becomes_active_when_it_loads() {
        let mut r = roster();
        r.bind("humvee", MemberId(9));
        assert_eq!(r.active(), None);
        r.bind("truck", MemberId(4));
        assert_eq!(r.active(), Some(MemberId(4)));
        assert_eq!(r.switch("4").as_deref(), Some("Now driving: humvee"));
        assert_eq!(r.active(), Some(MemberId(9)));
    }

    #[test]
    fn switching_before_the_first_vehicle_loads_sticks() {
        let mut r = roster();
        r.bind("humvee", MemberId(9));
        assert!(r.switch("4").is_some());
        r.bind("truck", MemberId(4));
        assert_eq!(r.active(), Some(MemberId(9)));
    }

    #[test]
    fn non_vehicles_are_ignored() {
        let mut r = roster();
        r.bind("piano", MemberId(1));
        assert_eq!(r.active(), None);
        assert_eq!(r.switch("9"), None);
    }
}
