//! Motor classes and their calibrated models.
//!
//! Each [`MotorKind`] maps to a [`MotorModel`]: the discrete-time
//! coefficients of a second-order DC motor model sampled at the control
//! loop period, plus the electrical constants used for feedforward.
//!
//! ## Model
//!
//! State is position θ [deg] and speed ω [deg/s]; input is torque τ [Nm].
//!
//! ```text
//! θ[k+1] = θ[k] + phi_01·ω[k] + gam_0·τ
//! ω[k+1] =        phi_11·ω[k] + gam_1·(τ − τ_friction)
//! ```
//!
//! Electrical torque is `k_0·V`. Back-EMF needs `k_2` volts per deg/s and
//! acceleration needs `k_1` volts per deg/s².

use serde::{Deserialize, Serialize};

/// Motor classes supported by the motion core.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MotorKind {
    /// SPIKE / Technic small angular motor.
    TechnicSAngular,
    /// SPIKE / Technic medium angular motor.
    TechnicMAngular,
    /// SPIKE / Technic large angular motor.
    TechnicLAngular,
    /// Technic large motor.
    TechnicL,
    /// Technic extra-large motor.
    TechnicXl,
    /// BOOST interactive motor.
    Interactive,
    /// Move Hub internal motor.
    MoveHub,
    /// EV3 medium motor.
    Ev3Medium,
    /// EV3 large motor.
    Ev3Large,
    /// Plain DC motor without rotation sensor (trains, simple lights).
    DcOnly,
}

impl MotorKind {
    /// Whether this motor class has an encoder and supports servo control.
    #[inline]
    pub const fn has_encoder(&self) -> bool {
        !matches!(self, Self::DcOnly)
    }

    /// Hardware voltage ceiling [mV].
    pub const fn max_voltage_hardware(&self) -> i32 {
        match self {
            Self::Interactive | Self::MoveHub => 6_000,
            _ => 9_000,
        }
    }

    /// Calibrated model, or `None` for motors without an encoder.
    pub const fn model(&self) -> Option<&'static MotorModel> {
        match self {
            Self::TechnicSAngular => Some(&MODEL_TECHNIC_S_ANGULAR),
            Self::TechnicMAngular => Some(&MODEL_TECHNIC_M_ANGULAR),
            Self::TechnicLAngular => Some(&MODEL_TECHNIC_L_ANGULAR),
            Self::TechnicL => Some(&MODEL_TECHNIC_L),
            Self::TechnicXl => Some(&MODEL_TECHNIC_XL),
            Self::Interactive => Some(&MODEL_INTERACTIVE),
            Self::MoveHub => Some(&MODEL_MOVEHUB),
            Self::Ev3Medium => Some(&MODEL_EV3_MEDIUM),
            Self::Ev3Large => Some(&MODEL_EV3_LARGE),
            Self::DcOnly => None,
        }
    }
}

/// Positive rotation sense of an axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    /// Positive duty turns the shaft clockwise.
    #[default]
    Clockwise,
    /// Positive duty turns the shaft counterclockwise.
    Counterclockwise,
}

impl Direction {
    /// Sign applied to duty cycles and encoder readings.
    #[inline]
    pub const fn sign(&self) -> i32 {
        match self {
            Self::Clockwise => 1,
            Self::Counterclockwise => -1,
        }
    }
}

/// Discrete-time motor model coefficients.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MotorModel {
    /// Position response to speed [s].
    pub phi_01: f32,
    /// Speed decay per sample.
    pub phi_11: f32,
    /// Position response to torque [deg/Nm].
    pub gam_0: f32,
    /// Speed response to torque [deg/s/Nm].
    pub gam_1: f32,
    /// Torque per volt [Nm/V].
    pub k_0: f32,
    /// Voltage per acceleration [V/(deg/s²)].
    pub k_1: f32,
    /// Voltage per speed [V/(deg/s)].
    pub k_2: f32,
    /// Coulomb friction [Nm].
    pub f_low: f32,
    /// Observer position feedback gain [Nm/deg].
    pub obs_gain: f32,
    /// Controller defaults for this motor.
    pub defaults: MotorDefaults,
}

impl MotorModel {
    /// Whether the model carries dynamics (EV3 tables only hold the
    /// electrical constants).
    #[inline]
    pub fn has_dynamics(&self) -> bool {
        self.phi_11 > 0.0 && self.gam_1 > 0.0
    }

    /// Stall torque at the given voltage [µNm].
    #[inline]
    pub fn voltage_to_torque(&self, voltage_mv: i32) -> i32 {
        (self.k_0 * voltage_mv as f32 * 1000.0) as i32
    }

    /// Voltage needed for the given torque [mV].
    #[inline]
    pub fn torque_to_voltage(&self, torque_unm: i32) -> i32 {
        if self.k_0 <= 0.0 {
            return 0;
        }
        (torque_unm as f32 / self.k_0 / 1000.0) as i32
    }
}

/// Controller defaults that come with a motor class, in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MotorDefaults {
    /// Speed limit [deg/s].
    pub speed_max: i32,
    /// Acceleration and deceleration [deg/s²].
    pub acceleration: i32,
    /// Speed tolerance [deg/s].
    pub speed_tolerance: i32,
    /// Position tolerance [deg].
    pub position_tolerance: i32,
    /// Stall speed limit [deg/s].
    pub stall_speed_limit: i32,
    /// Stall time [ms].
    pub stall_time_ms: u32,
    /// Proportional gain [µNm/deg].
    pub pid_kp: i32,
    /// Derivative gain [µNm/(deg/s)].
    pub pid_kd: i32,
    /// Integral accumulation rate limit [deg/s].
    pub integral_rate: i32,
    /// Whether speed feedback comes from the observer.
    pub use_estimated_rate: bool,
}

// ─── Calibration tables ─────────────────────────────────────────────

pub static MODEL_TECHNIC_S_ANGULAR: MotorModel = MotorModel {
    phi_01: 0.004_685_822,
    phi_11: 0.877_018,
    gam_0: 4.497_473,
    gam_1: 1_760.495_9,
    k_0: 0.010_402_524,
    k_1: 0.000_255_865_7,
    k_2: 0.006_715_337,
    f_low: 0.0005,
    obs_gain: 0.000_5,
    defaults: MotorDefaults {
        speed_max: 620,
        acceleration: 2000,
        speed_tolerance: 50,
        position_tolerance: 10,
        stall_speed_limit: 20,
        stall_time_ms: 200,
        pid_kp: 7500,
        pid_kd: 1000,
        integral_rate: 15,
        use_estimated_rate: true,
    },
};

pub static MODEL_TECHNIC_M_ANGULAR: MotorModel = MotorModel {
    phi_01: 0.004_656_238,
    phi_11: 0.865_721_1,
    gam_0: 2.365_221_6,
    gam_1: 923.893_26,
    k_0: 0.022_584_356,
    k_1: 0.000_223_154_5,
    k_2: 0.006_435_438,
    f_low: 0.012_186_413,
    obs_gain: 0.002,
    defaults: MotorDefaults {
        speed_max: 1080,
        acceleration: 2000,
        speed_tolerance: 50,
        position_tolerance: 10,
        stall_speed_limit: 20,
        stall_time_ms: 200,
        pid_kp: 15000,
        pid_kd: 1800,
        integral_rate: 15,
        use_estimated_rate: true,
    },
};

pub static MODEL_TECHNIC_L_ANGULAR: MotorModel = MotorModel {
    phi_01: 0.004_761_391,
    phi_11: 0.906_099_5,
    gam_0: 0.684_051_95,
    gam_1: 269.197_4,
    k_0: 0.052_359_22,
    k_1: 0.000_337_807_9,
    k_2: 0.006_661_989,
    f_low: 0.011_619_603,
    obs_gain: 0.004,
    defaults: MotorDefaults {
        speed_max: 970,
        acceleration: 1500,
        speed_tolerance: 50,
        position_tolerance: 10,
        stall_speed_limit: 20,
        stall_time_ms: 200,
        pid_kp: 35000,
        pid_kd: 6000,
        integral_rate: 15,
        use_estimated_rate: true,
    },
};

pub static MODEL_TECHNIC_L: MotorModel = MotorModel {
    phi_01: 0.004_806_734,
    phi_11: 0.923_702_6,
    gam_0: 1.539_987_2,
    gam_1: 607.954,
    k_0: 0.029_291_368,
    k_1: 0.000_269_922_9,
    k_2: 0.004_284_49,
    f_low: 0.013_215,
    obs_gain: 0.002,
    defaults: MotorDefaults {
        speed_max: 1470,
        acceleration: 1500,
        speed_tolerance: 50,
        position_tolerance: 10,
        stall_speed_limit: 20,
        stall_time_ms: 200,
        pid_kp: 20000,
        pid_kd: 2500,
        integral_rate: 5,
        use_estimated_rate: true,
    },
};

pub static MODEL_TECHNIC_XL: MotorModel = MotorModel {
    phi_01: 0.004_815_3,
    phi_11: 0.927_040_9,
    gam_0: 1.660_417_6,
    gam_1: 655.886_4,
    k_0: 0.025_904_742,
    k_1: 0.000_283_410_1,
    k_2: 0.004_294_093,
    f_low: 0.002,
    obs_gain: 0.002,
    defaults: MotorDefaults {
        speed_max: 1525,
        acceleration: 2500,
        speed_tolerance: 50,
        position_tolerance: 10,
        stall_speed_limit: 20,
        stall_time_ms: 200,
        pid_kp: 17500,
        pid_kd: 2500,
        integral_rate: 5,
        use_estimated_rate: true,
    },
};

pub static MODEL_INTERACTIVE: MotorModel = MotorModel {
    phi_01: 0.004_762_719,
    phi_11: 0.906_613_35,
    gam_0: 2.931_116,
    gam_1: 1_153.599_8,
    k_0: 0.015_009_332,
    k_1: 0.000_275_067,
    k_2: 0.005_393_47,
    f_low: 0.005_613_423,
    obs_gain: 0.002,
    defaults: MotorDefaults {
        speed_max: 1000,
        acceleration: 2000,
        speed_tolerance: 50,
        position_tolerance: 5,
        stall_speed_limit: 15,
        stall_time_ms: 200,
        pid_kp: 13500,
        pid_kd: 1350,
        integral_rate: 10,
        use_estimated_rate: true,
    },
};

pub static MODEL_MOVEHUB: MotorModel = MotorModel {
    phi_01: 0.004_825_605,
    phi_11: 0.931_062_8,
    gam_0: 2.205_578_5,
    gam_1: 871.853_1,
    k_0: 0.021_209_033,
    k_1: 0.000_260_968_2,
    k_2: 0.003_728_118,
    f_low: 0.012_417_391,
    obs_gain: 0.002,
    defaults: MotorDefaults {
        speed_max: 1500,
        acceleration: 5000,
        speed_tolerance: 50,
        position_tolerance: 6,
        stall_speed_limit: 15,
        stall_time_ms: 200,
        pid_kp: 15000,
        pid_kd: 500,
        integral_rate: 5,
        use_estimated_rate: true,
    },
};

pub static MODEL_EV3_MEDIUM: MotorModel = MotorModel {
    phi_01: 0.0,
    phi_11: 0.0,
    gam_0: 0.0,
    gam_1: 0.0,
    k_0: 0.022_227_062,
    k_1: 0.000_204_397_6,
    k_2: 0.002_620_482,
    f_low: 0.009_158_621,
    obs_gain: 0.0,
    defaults: MotorDefaults {
        speed_max: 2000,
        acceleration: 8000,
        speed_tolerance: 100,
        position_tolerance: 10,
        stall_speed_limit: 30,
        stall_time_ms: 200,
        pid_kp: 3000,
        pid_kd: 30,
        integral_rate: 10,
        use_estimated_rate: false,
    },
};

pub static MODEL_EV3_LARGE: MotorModel = MotorModel {
    phi_01: 0.0,
    phi_11: 0.0,
    gam_0: 0.0,
    gam_1: 0.0,
    k_0: 0.049_886_243,
    k_1: 0.000_433_486_2,
    k_2: 0.004_128_44,
    f_low: 0.008_238_095,
    obs_gain: 0.0,
    defaults: MotorDefaults {
        speed_max: 1600,
        acceleration: 3200,
        speed_tolerance: 100,
        position_tolerance: 10,
        stall_speed_limit: 30,
        stall_time_ms: 200,
        pid_kp: 15000,
        pid_kd: 250,
        integral_rate: 10,
        use_estimated_rate: false,
    },
};
