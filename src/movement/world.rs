use bevy::prelude::*;

/// Collision object categories. Sweeps can be filtered down to a subset,
/// the way the mantle solver only cares about static level geometry.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ObjectType {
    WorldStatic,
    WorldDynamic,
}

/// Nearest blocking hit returned by a ray or shape sweep.
#[derive(Clone, Copy, Debug)]
pub struct SweepHit {
    pub distance: f32,
    pub point: Vec3,
    pub normal: Vec3,
}

/// Vertical capsule used for character sweeps, approximated by its bounding
/// extents. Level geometry is axis-aligned so the approximation is exact at
/// the contact faces we care about.
#[derive(Clone, Copy, Debug)]
pub struct CapsuleShape {
    pub radius: f32,
    pub half_height: f32,
}

impl CapsuleShape {
    pub fn extents(&self) -> Vec3 {
        Vec3::new(self.radius, self.radius, self.half_height)
    }
}

/// Synchronous point-in-time geometry queries against static level geometry.
///
/// This is the only external dependency of the movement simulation. Server,
/// client and tests all drive the same simulation against an implementation
/// of this trait.
pub trait CollisionWorld {
    /// Nearest blocking hit along a ray, or None.
    fn raycast(&self, start: Vec3, dir: Vec3, max_distance: f32) -> Option<SweepHit>;

    /// Sweep a capsule from `start` to `end`, returning the nearest blocking
    /// hit among objects matching `filter` (empty filter = everything).
    fn sweep_capsule(
        &self,
        capsule: &CapsuleShape,
        start: Vec3,
        end: Vec3,
        filter: &[ObjectType],
    ) -> Option<SweepHit>;

    /// Whether a point is inside a water volume.
    fn in_water(&self, point: Vec3) -> bool;
}

/// Axis-aligned box.
#[derive(Clone, Copy, Debug)]
pub struct Aabb {
    pub min: Vec3,
    pub max: Vec3,
}

impl Aabb {
    pub fn new(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    pub fn from_center(center: Vec3, half_extents: Vec3) -> Self {
        Self {
            min: center - half_extents,
            max: center + half_extents,
        }
    }

    pub fn contains(&self, p: Vec3) -> bool {
        p.x >= self.min.x
            && p.x <= self.max.x
            && p.y >= self.min.y
            && p.y <= self.max.y
            && p.z >= self.min.z
            && p.z <= self.max.z
    }

    fn inflate(&self, by: Vec3) -> Aabb {
        Aabb {
            min: self.min - by,
            max: self.max + by,
        }
    }
}

/// One solid block of level geometry.
#[derive(Clone, Debug)]
pub struct Block {
    pub aabb: Aabb,
    pub object_type: ObjectType,
}

/// Static level geometry: solid blocks plus water volumes.
#[derive(Resource, Clone, Debug, Default)]
pub struct StaticWorld {
    pub blocks: Vec<Block>,
    pub water: Vec<Aabb>,
}

impl StaticWorld {
    pub fn add_block(&mut self, aabb: Aabb) {
        self.blocks.push(Block {
            aabb,
            object_type: ObjectType::WorldStatic,
        });
    }

    pub fn add_dynamic_block(&mut self, aabb: Aabb) {
        self.blocks.push(Block {
            aabb,
            object_type: ObjectType::WorldDynamic,
        });
    }

    pub fn add_water(&mut self, aabb: Aabb) {
        self.water.push(aabb);
    }

    /// Segment-vs-AABB intersection (slab method). Returns entry time in
    /// [0, 1] and the entry face normal. A segment starting inside returns
    /// t = 0 with a best-effort normal.
    fn intersect_segment(aabb: &Aabb, start: Vec3, delta: Vec3) -> Option<(f32, Vec3)> {
        let mut t_enter = 0.0_f32;
        let mut t_exit = 1.0_f32;
        let mut enter_axis = 0usize;
        let mut enter_sign = 0.0_f32;

        for axis in 0..3 {
            let s = start[axis];
            let d = delta[axis];
            let lo = aabb.min[axis];
            let hi = aabb.max[axis];

            if d.abs() < 1e-8 {
                if s < lo || s > hi {
                    return None;
                }
                continue;
            }

            let inv = 1.0 / d;
            let mut t0 = (lo - s) * inv;
            let mut t1 = (hi - s) * inv;
            if t0 > t1 {
                std::mem::swap(&mut t0, &mut t1);
            }
            if t0 > t_enter {
                t_enter = t0;
                enter_axis = axis;
                enter_sign = -d.signum();
            }
            t_exit = t_exit.min(t1);
            if t_enter > t_exit {
                return None;
            }
        }

        if t_exit < 0.0 || t_enter > 1.0 {
            return None;
        }

        let normal = if enter_sign == 0.0 {
            // Started inside the box; treat it as support from below
            Vec3::Z
        } else {
            let mut n = Vec3::ZERO;
            n[enter_axis] = enter_sign;
            n
        };
        Some((t_enter.max(0.0), normal))
    }

    fn sweep_extents(
        &self,
        extents: Vec3,
        start: Vec3,
        end: Vec3,
        filter: &[ObjectType],
    ) -> Option<SweepHit> {
        let delta = end - start;
        let mut best: Option<(f32, Vec3)> = None;

        for block in &self.blocks {
            if !filter.is_empty() && !filter.contains(&block.object_type) {
                continue;
            }
            let inflated = block.aabb.inflate(extents);
            if let Some((t, normal)) = Self::intersect_segment(&inflated, start, delta) {
                match best {
                    Some((best_t, _)) if best_t <= t => {}
                    _ => best = Some((t, normal)),
                }
            }
        }

        best.map(|(t, normal)| SweepHit {
            distance: t * delta.length(),
            point: start + delta * t,
            normal,
        })
    }
}

impl CollisionWorld for StaticWorld {
    fn raycast(&self, start: Vec3, dir: Vec3, max_distance: f32) -> Option<SweepHit> {
        self.sweep_extents(Vec3::ZERO, start, start + dir * max_distance, &[])
    }

    fn sweep_capsule(
        &self,
        capsule: &CapsuleShape,
        start: Vec3,
        end: Vec3,
        filter: &[ObjectType],
    ) -> Option<SweepHit> {
        self.sweep_extents(capsule.extents(), start, end, filter)
    }

    fn in_water(&self, point: Vec3) -> bool {
        self.water.iter().any(|w| w.contains(point))
    }
}

/// Result of searching for a floor under the capsule.
#[derive(Clone, Copy, Debug, Default)]
pub struct FloorResult {
    pub blocking: bool,
    pub walkable: bool,
    pub distance: f32,
    pub point: Vec3,
    pub normal: Vec3,
}

impl FloorResult {
    pub fn none() -> Self {
        Self::default()
    }
}

/// Sweep the capsule straight down looking for support.
pub fn find_floor(
    world: &dyn CollisionWorld,
    position: Vec3,
    capsule: &CapsuleShape,
    walkable_floor_z: f32,
    snap_distance: f32,
) -> FloorResult {
    let end = position + Vec3::NEG_Z * snap_distance;
    match world.sweep_capsule(capsule, position, end, &[]) {
        Some(hit) => FloorResult {
            blocking: true,
            walkable: hit.normal.z >= walkable_floor_z,
            distance: hit.distance,
            point: hit.point,
            normal: hit.normal,
        },
        None => FloorResult::none(),
    }
}

/// A box-shaped level used by the demo client, the server and the tests.
///
/// Layout (units roughly match the character capsule, Z up):
/// a large ground slab, a mantle ledge, an elevated walkway connecting the
/// ledge to a tall wall-run wall pair forming a corridor, and a water pool.
pub fn demo_level() -> StaticWorld {
    let mut world = StaticWorld::default();

    // Ground slab, top surface at z = 0
    world.add_block(Aabb::new(
        Vec3::new(-5000.0, -5000.0, -200.0),
        Vec3::new(5000.0, 5000.0, 0.0),
    ));

    // Mantle ledge: 150 tall box ahead of spawn
    world.add_block(Aabb::new(
        Vec3::new(600.0, -200.0, 0.0),
        Vec3::new(900.0, 200.0, 150.0),
    ));

    // Walkway at ledge height, from the ledge toward the corridor entry
    world.add_block(Aabb::new(
        Vec3::new(-100.0, 200.0, 0.0),
        Vec3::new(900.0, 1000.0, 150.0),
    ));

    // Wall-run corridor: two parallel walls along +Y with a pit between them
    world.add_block(Aabb::new(
        Vec3::new(-300.0, 1000.0, 0.0),
        Vec3::new(-200.0, 3000.0, 600.0),
    ));
    world.add_block(Aabb::new(
        Vec3::new(200.0, 1000.0, 0.0),
        Vec3::new(300.0, 3000.0, 600.0),
    ));

    // Water pool
    world.add_water(Aabb::new(
        Vec3::new(-2000.0, -2000.0, -200.0),
        Vec3::new(-1500.0, -1500.0, -20.0),
    ));

    world
}
