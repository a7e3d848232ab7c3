//! Held movement keys for both paddles.

use pong_shared::config::PADDLE_STEP;
use pong_shared::protocol::KeyCode;
use pong_shared::vec3::Vec3;

/// Currently held keys, one slot per `KeyCode` in slot order.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct KeyState([bool; 8]);

impl KeyState {
    pub fn is_held(&self, key: KeyCode) -> bool {
        self.0[key.slot()]
    }

    pub fn set(&mut self, key: KeyCode, pressed: bool) {
        self.0[key.slot()] = pressed;
    }

    /// Per-tick displacement of the near paddle (W/A/S/D).
    pub fn near_paddle_delta(&self) -> Vec3 {
        Vec3::new(
            self.axis(KeyCode::A, -1.0, KeyCode::D),
            self.axis(KeyCode::W, 1.0, KeyCode::S),
            0.0,
        )
    }

    /// Per-tick displacement of the far paddle. Left/right are mirrored since
    /// that player looks down the opposite z direction.
    pub fn far_paddle_delta(&self) -> Vec3 {
        Vec3::new(
            self.axis(KeyCode::Left, 1.0, KeyCode::Right),
            self.axis(KeyCode::Up, 1.0, KeyCode::Down),
            0.0,
        )
    }

    /// `first` moves along `direction`, `second` against it; `first` wins when both are held.
    fn axis(&self, first: KeyCode, direction: f64, second: KeyCode) -> f64 {
        if self.is_held(first) {
            direction * PADDLE_STEP
        } else if self.is_held(second) {
            -direction * PADDLE_STEP
        } else {
            0.0
        }
    }
}

/// Key transitions received since the last tick. A later write to the same
/// key replaces the earlier one; nothing is queued.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PendingKeys([Option<bool>; 8]);

impl PendingKeys {
    pub fn record(&mut self, updates: &[(KeyCode, bool)]) {
        for &(key, pressed) in updates {
            self.0[key.slot()] = Some(pressed);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.0.iter().all(Option::is_none)
    }

    /// Merge the buffered transitions into `held` and clear the buffer.
    pub fn drain_into(&mut self, held: &mut KeyState) {
        for key in KeyCode::ALL {
            if let Some(pressed) = self.0[key.slot()].take() {
                held.set(key, pressed);
            }
        }
    }
}
