//! Orientation sensor seam.
//!
//! Desktop platforms have no gyroscope, so the default sensor reports itself
//! unavailable and the renderer falls back to pointer input. Hosts with real
//! hardware (or tests) plug in their own [`OrientationSensor`].

use std::collections::VecDeque;

/// Euler angles in degrees, as reported by a device orientation event.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct OrientationReading {
    /// Rotation around the z axis (compass heading). Unused for tilt.
    pub alpha: f32,
    /// Front-back tilt.
    pub beta: f32,
    /// Left-right tilt.
    pub gamma: f32,
}

/// Outcome of a permission request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Permission {
    Granted,
    Denied,
    /// The platform has no orientation sensor.
    Unavailable,
}

/// A source of device orientation readings.
///
/// `request_permission` is called when the user selects orientation mode;
/// `poll` is called once per frame while that mode is active and returns the
/// newest reading, if any arrived since the last poll.
pub trait OrientationSensor: Send {
    fn request_permission(&mut self) -> Permission;

    fn poll(&mut self) -> Option<OrientationReading>;
}

impl<S: OrientationSensor + ?Sized> OrientationSensor for Box<S> {
    fn request_permission(&mut self) -> Permission {
        (**self).request_permission()
    }

    fn poll(&mut self) -> Option<OrientationReading> {
        (**self).poll()
    }
}

/// Sensor for platforms without orientation hardware.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoOrientationSensor;

impl OrientationSensor for NoOrientationSensor {
    fn request_permission(&mut self) -> Permission {
        Permission::Unavailable
    }

    fn poll(&mut self) -> Option<OrientationReading> {
        None
    }
}

/// Replays a fixed list of readings, one per poll.
///
/// Readings are only handed out after permission has been granted.
#[derive(Debug, Clone)]
pub struct ScriptedSensor {
    permission: Permission,
    granted: bool,
    readings: VecDeque<OrientationReading>,
}

impl ScriptedSensor {
    /// A sensor that grants permission and replays `readings`.
    pub fn new(readings: impl IntoIterator<Item = OrientationReading>) -> Self {
        Self {
            permission: Permission::Granted,
            granted: false,
            readings: readings.into_iter().collect(),
        }
    }

    /// A sensor whose permission request is always denied.
    pub fn denied() -> Self {
        Self {
            permission: Permission::Denied,
            granted: false,
            readings: VecDeque::new(),
        }
    }

    /// Queue another reading.
    pub fn push(&mut self, reading: OrientationReading) {
        self.readings.push_back(reading);
    }
}

impl OrientationSensor for ScriptedSensor {
    fn request_permission(&mut self) -> Permission {
        self.granted = self.permission == Permission::Granted;
        self.permission
    }

    fn poll(&mut self) -> Option<OrientationReading> {
        if self.granted {
            self.readings.pop_front()
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_sensor_is_unavailable() {
        let mut sensor = NoOrientationSensor;
        assert_eq!(sensor.request_permission(), Permission::Unavailable);
        assert!(sensor.poll().is_none());
    }

    #[test]
    fn test_scripted_requires_permission() {
        let reading = OrientationReading {
            alpha: 0.0,
            beta: 60.0,
            gamma: 10.0,
        };
        let mut sensor = ScriptedSensor::new([reading]);
        assert!(sensor.poll().is_none());
        assert_eq!(sensor.request_permission(), Permission::Granted);
        assert_eq!(sensor.poll(), Some(reading));
        assert!(sensor.poll().is_none());
    }

    #[test]
    fn test_denied_sensor() {
        let mut sensor = ScriptedSensor::denied();
        sensor.push(OrientationReading::default());
        assert_eq!(sensor.request_permission(), Permission::Denied);
        assert!(sensor.poll().is_none());
    }
}
