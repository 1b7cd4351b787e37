//! Narrow façade over the rigid-body library.
//!
//! Exactly what the core needs and nothing more: a zero-gravity world,
//! static rectangles for standing walls, dynamic ball bodies for rockets,
//! `step`, position readback, and contact polling for watched bodies.
//! Grenade motion deliberately does not go through here.

use std::collections::{HashMap, HashSet};

use glam::DVec2;
use rapier2d_f64::prelude::*;

pub struct PhysicsWorld {
    rigid_body_set: RigidBodySet,
    collider_set: ColliderSet,
    gravity: Vector<Real>,
    integration_parameters: IntegrationParameters,
    physics_pipeline: PhysicsPipeline,
    island_manager: IslandManager,
    broad_phase: DefaultBroadPhase,
    narrow_phase: NarrowPhase,
    impulse_joint_set: ImpulseJointSet,
    multibody_joint_set: MultibodyJointSet,
    ccd_solver: CCDSolver,
    query_pipeline: QueryPipeline,
    /// Wall id → static body.
    statics: HashMap<String, RigidBodyHandle>,
    /// External label per body, for contact reporting.
    labels: HashMap<RigidBodyHandle, String>,
    watched: HashSet<RigidBodyHandle>,
}

impl Default for PhysicsWorld {
    fn default() -> Self {
        Self::new()
    }
}

impl PhysicsWorld {
    pub fn new() -> Self {
        Self {
            rigid_body_set: RigidBodySet::new(),
            collider_set: ColliderSet::new(),
            gravity: vector![0.0, 0.0],
            integration_parameters: IntegrationParameters::default(),
            physics_pipeline: PhysicsPipeline::new(),
            island_manager: IslandManager::new(),
            broad_phase: DefaultBroadPhase::new(),
            narrow_phase: NarrowPhase::new(),
            impulse_joint_set: ImpulseJointSet::new(),
            multibody_joint_set: MultibodyJointSet::new(),
            ccd_solver: CCDSolver::new(),
            query_pipeline: QueryPipeline::new(),
            statics: HashMap::new(),
            labels: HashMap::new(),
            watched: HashSet::new(),
        }
    }

    /// Add (or replace) a static rectangular body for a wall.
    pub fn add_static_rect(&mut self, id: &str, x: f64, y: f64, w: f64, h: f64) {
        self.remove_static(id);
        let body = RigidBodyBuilder::fixed()
            .translation(vector![x + w / 2.0, y + h / 2.0])
            .build();
        let handle = self.rigid_body_set.insert(body);
        let collider = ColliderBuilder::cuboid(w / 2.0, h / 2.0).build();
        self.collider_set
            .insert_with_parent(collider, handle, &mut self.rigid_body_set);
        self.statics.insert(id.to_string(), handle);
        self.labels.insert(handle, id.to_string());
    }

    pub fn remove_static(&mut self, id: &str) {
        if let Some(handle) = self.statics.remove(id) {
            self.remove_handle(handle);
        }
    }

    /// Dynamic ball body (rockets). The collider is a sensor: the helper
    /// integrates motion, the core resolves contacts itself with a swept
    /// line so it can name the slice that was hit.
    pub fn add_dynamic_ball(
        &mut self,
        label: &str,
        position: DVec2,
        velocity: DVec2,
        radius: f64,
    ) -> RigidBodyHandle {
        let body = RigidBodyBuilder::dynamic()
            .translation(vector![position.x, position.y])
            .linvel(vector![velocity.x, velocity.y])
            .linear_damping(0.0)
            .ccd_enabled(true)
            .build();
        let handle = self.rigid_body_set.insert(body);
        let collider = ColliderBuilder::ball(radius).sensor(true).build();
        self.collider_set
            .insert_with_parent(collider, handle, &mut self.rigid_body_set);
        self.labels.insert(handle, label.to_string());
        handle
    }

    pub fn remove_body(&mut self, handle: RigidBodyHandle) {
        self.remove_handle(handle);
    }

    fn remove_handle(&mut self, handle: RigidBodyHandle) {
        self.labels.remove(&handle);
        self.watched.remove(&handle);
        self.rigid_body_set.remove(
            handle,
            &mut self.island_manager,
            &mut self.collider_set,
            &mut self.impulse_joint_set,
            &mut self.multibody_joint_set,
            true,
        );
    }

    pub fn body_position(&self, handle: RigidBodyHandle) -> Option<DVec2> {
        self.rigid_body_set
            .get(handle)
            .map(|b| DVec2::new(b.translation().x, b.translation().y))
    }

    pub fn body_velocity(&self, handle: RigidBodyHandle) -> Option<DVec2> {
        self.rigid_body_set
            .get(handle)
            .map(|b| DVec2::new(b.linvel().x, b.linvel().y))
    }

    /// Report contacts involving this body from `drain_contacts`.
    pub fn watch_contacts(&mut self, handle: RigidBodyHandle) {
        self.watched.insert(handle);
    }

    pub fn unwatch_contacts(&mut self, handle: RigidBodyHandle) {
        self.watched.remove(&handle);
    }

    pub fn step(&mut self, dt: f64) {
        self.integration_parameters.dt = dt;
        self.physics_pipeline.step(
            &self.gravity,
            &self.integration_parameters,
            &mut self.island_manager,
            &mut self.broad_phase,
            &mut self.narrow_phase,
            &mut self.rigid_body_set,
            &mut self.collider_set,
            &mut self.impulse_joint_set,
            &mut self.multibody_joint_set,
            &mut self.ccd_solver,
            Some(&mut self.query_pipeline),
            &(),
            &(),
        );
    }

    /// Label pairs for watched bodies currently in contact or intersection.
    pub fn drain_contacts(&self) -> Vec<(String, String)> {
        let mut out = Vec::new();
        for &handle in &self.watched {
            let colliders = match self.rigid_body_set.get(handle) {
                Some(b) => b.colliders(),
                None => continue,
            };
            for &collider in colliders {
                for (c1, c2, intersecting) in
                    self.narrow_phase.intersection_pairs_with(collider)
                {
                    if !intersecting {
                        continue;
                    }
                    let other = if c1 == collider { c2 } else { c1 };
                    if let Some(pair) = self.label_pair(collider, other) {
                        out.push(pair);
                    }
                }
            }
        }
        out
    }

    fn label_pair(
        &self,
        a: ColliderHandle,
        b: ColliderHandle,
    ) -> Option<(String, String)> {
        let label_of = |c: ColliderHandle| {
            self.collider_set
                .get(c)
                .and_then(|col| col.parent())
                .and_then(|body| self.labels.get(&body))
                .cloned()
        };
        Some((label_of(a)?, label_of(b)?))
    }
}
