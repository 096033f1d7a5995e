//! Car structure and behavior: physics, sensing and scoring.

use crate::config::{CarConfig, Config, ScoringConfig, SensorConfig, TerminalScoring};
use crate::neural::Controller;
use crate::track::{Track, Vec2, Zone};
use serde::{Deserialize, Serialize};

/// Driving state of a car within a generation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CarState {
    Crashed,
    OnGrass,
    OnRoad,
    Goal,
}

impl CarState {
    /// Numeric code fed to the controller
    #[inline]
    pub fn code(self) -> u8 {
        match self {
            CarState::Crashed => 0,
            CarState::OnGrass => 1,
            CarState::OnRoad => 2,
            CarState::Goal => 3,
        }
    }

    /// Crashed and goal cars stay parked until the generation ends
    #[inline]
    pub fn is_terminal(self) -> bool {
        matches!(self, CarState::Crashed | CarState::Goal)
    }
}

/// One trajectory sample
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HistoryNode {
    pub position: Vec2,
    /// Forward acceleration applied on that tick
    pub acceleration: f64,
}

/// A sensor ray resolved against the track
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SensorRay {
    /// Absolute angle in degrees
    pub angle: f64,
    pub distance: f64,
    pub end: Vec2,
}

/// A controller-driven car
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Car {
    // Physical state
    position: Vec2,
    velocity: Vec2,
    /// Degrees, counter-clockwise from +x in world coordinates
    heading: f64,

    // Driving
    state: CarState,
    controller: Controller,
    sensors: Vec<f64>,

    // Scoring
    score: f64,
    goal_bonus_awarded: bool,

    // Bookkeeping
    history: Vec<HistoryNode>,
    ticks: u32,
    finish_tick: Option<u32>,
}

#[inline]
fn direction(degrees: f64) -> Vec2 {
    let rad = degrees.to_radians();
    Vec2::new(rad.cos(), rad.sin())
}

/// Clamp a controller output to [-1, 1]; NaN becomes 0
#[inline]
fn unit(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(-1.0, 1.0)
    }
}

impl Car {
    /// Create a car at the track's start facing the first segment
    pub fn new(track: &Track, controller: Controller, config: &Config) -> Self {
        let (position, heading) = track.start_pose();
        Self::with_pose(track, controller, position, heading, config)
    }

    /// Create a car at an explicit position and heading
    pub fn with_pose(track: &Track, controller: Controller, position: Vec2, heading: f64, config: &Config) -> Self {
        let mut car = Self {
            position,
            velocity: Vec2::zeros(),
            heading,
            state: CarState::OnRoad,
            controller,
            sensors: Vec::new(),
            score: 0.0,
            goal_bonus_awarded: false,
            history: Vec::new(),
            ticks: 0,
            finish_tick: None,
        };
        car.sensors = car.scan(track, &config.sensors);
        car
    }

    /// Advance the car by one tick
    pub fn tick(&mut self, track: &Track, config: &Config) {
        self.ticks += 1;

        if self.state.is_terminal() {
            self.score_parked(&config.scoring);
            return;
        }

        // Decide
        let inputs = self.inputs(track, config);
        let outputs = self.controller.forward(&inputs);
        let throttle = unit(outputs.first().copied().unwrap_or(0.0));
        let steering = unit(outputs.get(1).copied().unwrap_or(0.0));

        let acceleration = throttle * config.car.acceleration_rate;
        self.turn(steering, &config.car);

        // Move
        let forward = direction(self.heading);
        self.velocity += forward * acceleration;

        let mut v_forward = forward * self.velocity.dot(&forward);
        let mut v_lateral = self.velocity - v_forward;

        let friction = match track.classify(&self.position) {
            Zone::Road => {
                self.state = CarState::OnRoad;
                config.car.road_friction
            }
            Zone::Goal => {
                self.reach_goal(&config.scoring);
                self.record_tick(track, acceleration, &config.scoring);
                return;
            }
            Zone::Runoff | Zone::Wall | Zone::OffTrack => {
                self.state = CarState::OnGrass;
                self.score += config.scoring.grass_penalty;
                config.car.grass_friction
            }
        };

        v_forward *= 1.0 - friction.forward_resistance;
        v_lateral *= if v_lateral.norm() <= config.car.max_static_lateral {
            1.0 - friction.lateral_static
        } else {
            1.0 - friction.lateral_kinetic
        };
        self.velocity = v_forward + v_lateral;

        let speed = self.velocity.norm();
        if speed > config.car.max_velocity {
            self.velocity *= config.car.max_velocity / speed;
        }

        self.position += self.velocity;

        // Sense
        if self.check_collision(track, &config.car) {
            self.crash(&config.scoring);
        }
        self.sensors = self.scan(track, &config.sensors);

        self.record_tick(track, acceleration, &config.scoring);
    }

    /// Steering authority fades to zero at top speed
    fn turn(&mut self, steering: f64, car: &CarConfig) {
        let speed_factor = 1.0 - (self.velocity.norm() / car.max_velocity).min(1.0);
        self.heading += steering * car.turn_rate * speed_factor;
    }

    fn record_tick(&mut self, track: &Track, acceleration: f64, scoring: &ScoringConfig) {
        self.history.push(HistoryNode {
            position: self.position,
            acceleration,
        });

        let traveled = track.traveled_fraction(&self.position);
        self.score += if traveled > scoring.progress_threshold {
            traveled * scoring.distance_reward
        } else {
            (1.0 - traveled) * scoring.crash_penalty
        };
    }

    fn crash(&mut self, scoring: &ScoringConfig) {
        self.state = CarState::Crashed;
        self.velocity = Vec2::zeros();
        self.score += scoring.crash_penalty;
    }

    fn reach_goal(&mut self, scoring: &ScoringConfig) {
        self.state = CarState::Goal;
        self.velocity = Vec2::zeros();
        self.finish_tick = Some(self.ticks);
        self.score += scoring.goal_reward;
    }

    fn score_parked(&mut self, scoring: &ScoringConfig) {
        if scoring.terminal == TerminalScoring::Once {
            return;
        }
        match self.state {
            CarState::Crashed => self.score += scoring.crash_penalty,
            CarState::Goal => self.score += scoring.goal_reward,
            CarState::OnRoad | CarState::OnGrass => {}
        }
    }

    /// Controller inputs: normalized sensor distances, speed, heading, state and progress
    fn inputs(&self, track: &Track, config: &Config) -> Vec<f64> {
        let max_distance = config.sensors.max_distance;
        let mut inputs = Vec::with_capacity(self.controller.n_inputs());

        inputs.extend(self.sensors.iter().map(|&d| if max_distance > 0.0 { d / max_distance } else { 0.0 }));
        inputs.push(self.speed() / config.car.max_velocity);
        inputs.push(self.heading.rem_euclid(360.0) / 360.0);
        inputs.push(f64::from(self.state.code()) / 4.0);
        inputs.push(track.traveled_fraction(&self.position));

        inputs.resize(self.controller.n_inputs(), 0.0);
        inputs
    }

    /// Any point on the collision ring inside a wall
    fn check_collision(&self, track: &Track, car: &CarConfig) -> bool {
        let samples = car.collision_samples.max(1);
        (0..samples).any(|k| {
            let angle = 360.0 * k as f64 / samples as f64;
            let probe = self.position + direction(angle) * car.collision_radius;
            track.classify(&probe).is_wall()
        })
    }

    /// Absolute angles of each sensor ray
    fn ray_angles(&self, sensors: &SensorConfig) -> impl Iterator<Item = f64> + '_ {
        let rays = sensors.rays;
        let arc = sensors.arc;
        let heading = self.heading;
        (0..rays).map(move |i| heading + i as f64 * arc / rays as f64 - arc / 2.0)
    }

    fn scan(&self, track: &Track, sensors: &SensorConfig) -> Vec<f64> {
        self.ray_angles(sensors)
            .map(|angle| cast_ray(track, self.position, angle, sensors))
            .collect()
    }

    /// Fresh sensor rays from the current pose, for debug overlays
    pub fn sensor_rays(&self, track: &Track, sensors: &SensorConfig) -> Vec<SensorRay> {
        self.ray_angles(sensors)
            .map(|angle| {
                let distance = cast_ray(track, self.position, angle, sensors);
                SensorRay {
                    angle,
                    distance,
                    end: self.position + direction(angle) * distance,
                }
            })
            .collect()
    }

    /// Grant the end-of-generation goal bonus; repeated calls add nothing
    pub fn finalize_fitness(&mut self, scoring: &ScoringConfig) {
        if self.state == CarState::Goal && !self.goal_bonus_awarded {
            self.score += scoring.end_goal_reward;
            self.goal_bonus_awarded = true;
        }
    }

    #[inline]
    pub fn position(&self) -> Vec2 {
        self.position
    }

    #[inline]
    pub fn velocity(&self) -> Vec2 {
        self.velocity
    }

    #[inline]
    pub fn speed(&self) -> f64 {
        self.velocity.norm()
    }

    /// Heading in degrees
    #[inline]
    pub fn heading(&self) -> f64 {
        self.heading
    }

    #[inline]
    pub fn state(&self) -> CarState {
        self.state
    }

    #[inline]
    pub fn score(&self) -> f64 {
        self.score
    }

    #[inline]
    pub fn controller(&self) -> &Controller {
        &self.controller
    }

    /// Sensor distances measured at the end of the last tick
    #[inline]
    pub fn sensor_readings(&self) -> &[f64] {
        &self.sensors
    }

    #[inline]
    pub fn history(&self) -> &[HistoryNode] {
        &self.history
    }

    /// Ticks simulated so far this generation
    #[inline]
    pub fn ticks(&self) -> u32 {
        self.ticks
    }

    /// Tick on which the goal was reached
    #[inline]
    pub fn finish_tick(&self) -> Option<u32> {
        self.finish_tick
    }
}

/// March along a ray until it enters a wall or reaches `max_distance`
fn cast_ray(track: &Track, origin: Vec2, angle: f64, sensors: &SensorConfig) -> f64 {
    let dir = direction(angle);
    let mut distance = 0.0;
    while distance < sensors.max_distance {
        if track.classify(&(origin + dir * distance)).is_wall() {
            return distance;
        }
        distance += sensors.step;
    }
    sensors.max_distance
}
