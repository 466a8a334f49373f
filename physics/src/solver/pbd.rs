/*!
The XPBD substep loop.

One call advances every body by `dt`:
1. gravity is queued and the broad phase pairs bodies once per call
2. islands decide which bodies sleep
3. each of the `n` substeps (`h = dt / n`) predicts poses from velocities
   and forces, rebuilds contact constraints from the narrow phase, runs the
   position passes, derives velocities from the pose change and finally
   runs the contact velocity pass
4. forces are cleared

Bodies are addressed by their index in the slice for the whole call.
*/

use log::{error, trace};

use crate::body::Body;
use crate::broad::{BroadPair, collision_pairs, simulation_islands};
use crate::collision::body_contacts;
use crate::settings::SimulationSettings;
use crate::solver::Constraint;
use crate::types::{Real, rotate_by, rotation_vector};

/// Advance `bodies` by `dt` with default settings and no joints.
pub fn simulate(bodies: &mut [Body], dt: Real) {
    simulate_with_constraints(bodies, &[], dt, &SimulationSettings::default());
}

/// Advance `bodies` by `dt`, also solving `constraints`.
///
/// The constraints are copied and their multipliers reset every substep, so
/// the caller's list is never modified. A non-positive `dt` does nothing.
pub fn simulate_with_constraints(
    bodies: &mut [Body],
    constraints: &[Constraint],
    dt: Real,
    settings: &SimulationSettings,
) {
    if dt <= 0.0 {
        return;
    }

    for body in bodies.iter_mut() {
        body.update_colliders();
        body.apply_gravity(&settings.gravity);
    }

    let pairs = collision_pairs(bodies, settings.broad_phase_slack);
    update_sleep_state(bodies, &pairs, constraints, dt, settings);

    let substeps = settings.substeps();
    let h = dt / Real::from(substeps);
    let restitution_threshold = settings.restitution_threshold(h);

    for _ in 0..substeps {
        predict(bodies, h);

        let mut step_constraints: Vec<Constraint> = constraints
            .iter()
            .cloned()
            .map(|mut c| {
                c.reset_lambdas();
                c
            })
            .collect();
        if settings.enable_collisions {
            push_contact_constraints(bodies, &pairs, &mut step_constraints);
        }

        for _ in 0..settings.pos_iters() {
            for constraint in &mut step_constraints {
                constraint.solve(bodies, h);
            }
        }

        update_velocities(bodies, h);

        for constraint in &step_constraints {
            constraint.solve_velocity(bodies, h, restitution_threshold);
        }
    }

    for body in bodies.iter_mut() {
        body.clear_forces();
        body.update_colliders();
    }
}

/// Accumulate rest time per body and put whole islands to sleep at once.
fn update_sleep_state(
    bodies: &mut [Body],
    pairs: &[BroadPair],
    constraints: &[Constraint],
    dt: Real,
    settings: &SimulationSettings,
) {
    let islands = simulation_islands(bodies, pairs, constraints);
    for island in &islands {
        let mut asleep = true;
        for id in island {
            let body = &mut bodies[id.index()];
            let resting = body.linear_velocity.norm() < settings.linear_sleep_threshold
                && body.angular_velocity.norm() < settings.angular_sleep_threshold;
            if resting {
                body.deactivation_time += dt;
            } else {
                body.deactivation_time = 0.0;
            }
            asleep &= body.deactivation_time >= settings.deactivation_time;
        }
        for id in island {
            bodies[id.index()].active = !asleep;
        }
    }
    trace!("pbd: {} pairs, {} islands", pairs.len(), islands.len());
}

/// Snapshot every body, then integrate the dynamic ones explicitly.
fn predict(bodies: &mut [Body], h: Real) {
    for body in bodies.iter_mut() {
        body.snapshot();
        if !body.is_dynamic() {
            continue;
        }

        let (force, torque) = body.net_force_and_torque();
        body.linear_velocity += force * (h * body.inverse_mass);
        body.position += body.linear_velocity * h;

        let inertia = body.world_inertia();
        let inverse_inertia = body.world_inverse_inertia();
        let gyroscopic = body.angular_velocity.cross(&(inertia * body.angular_velocity));
        body.angular_velocity += inverse_inertia * (torque - gyroscopic) * h;
        body.rotation = rotate_by(&body.rotation, &(body.angular_velocity * h));
    }
}

fn push_contact_constraints(bodies: &mut [Body], pairs: &[BroadPair], out: &mut Vec<Constraint>) {
    for pair in pairs {
        let (a, b) = (pair.a.index(), pair.b.index());
        let (fixed_a, fixed_b) = (bodies[a].is_fixed(), bodies[b].is_fixed());
        if !fixed_a && !fixed_b && bodies[a].is_active() != bodies[b].is_active() {
            error!(
                "pbd: {} and {} touch but only one of them is awake, pair skipped",
                pair.a, pair.b
            );
            continue;
        }
        if !bodies[a].is_dynamic() && !bodies[b].is_dynamic() {
            continue;
        }

        bodies[a].update_colliders();
        bodies[b].update_colliders();
        let (b1, b2) = (&bodies[a], &bodies[b]);
        out.extend(
            body_contacts(b1, b2)
                .iter()
                .map(|contact| Constraint::collision(pair.a, b1, pair.b, b2, contact)),
        );
    }
}

/// Velocities from the pose change over the substep.
fn update_velocities(bodies: &mut [Body], h: Real) {
    for body in bodies.iter_mut() {
        if !body.is_dynamic() {
            continue;
        }
        body.previous.linear_velocity = body.linear_velocity;
        body.previous.angular_velocity = body.angular_velocity;

        body.linear_velocity = (body.position - body.previous.position) / h;
        let delta = body.rotation * body.previous.rotation.inverse();
        body.angular_velocity = rotation_vector(&delta) / h;
    }
}
