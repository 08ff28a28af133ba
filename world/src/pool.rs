//! Keyed registry of reusable pooled instances.
//!
//! Buckets are pre-populated at registration and instances are never
//! destroyed afterwards; acquire/release only flip an instance between its
//! `Active` and `Inactive` states, so steady-state operation performs no
//! allocation. The sole exception is deliberate growth: an exhausted bucket
//! allocates one more instance instead of failing, trading amortized reuse
//! for burst tolerance.

use std::collections::HashMap;

use lane_rush_core::{ConfigurationError, InstanceId, PoolKey, SpawnPrototype, UnknownKeyError};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum InstanceState {
    Active,
    Inactive,
}

#[derive(Clone, Copy, Debug)]
pub(crate) struct Instance {
    key: PoolKey,
    state: InstanceState,
    position: f32,
    speed: f32,
    extent: f32,
}

impl Instance {
    pub(crate) fn key(&self) -> PoolKey {
        self.key
    }

    pub(crate) fn position(&self) -> f32 {
        self.position
    }

    pub(crate) fn speed(&self) -> f32 {
        self.speed
    }

    pub(crate) fn extent(&self) -> f32 {
        self.extent
    }
}

#[derive(Debug)]
struct Bucket {
    prototype: SpawnPrototype,
    free: Vec<InstanceId>,
}

#[derive(Debug)]
pub(crate) struct ObjectPool {
    buckets: HashMap<PoolKey, Bucket>,
    instances: Vec<Instance>,
}

impl ObjectPool {
    pub(crate) fn new() -> Self {
        Self {
            buckets: HashMap::new(),
            instances: Vec::new(),
        }
    }

    pub(crate) fn register(
        &mut self,
        key: PoolKey,
        prototype: SpawnPrototype,
        initial_count: usize,
    ) -> Result<(), ConfigurationError> {
        if self.buckets.contains_key(&key) {
            return Err(ConfigurationError::DuplicatePoolKey { key });
        }
        let mut free = Vec::with_capacity(initial_count);
        for _ in 0..initial_count {
            free.push(self.create_instance(key, prototype));
        }
        let _ = self.buckets.insert(key, Bucket { prototype, free });
        Ok(())
    }

    pub(crate) fn acquire(&mut self, key: PoolKey) -> Result<InstanceId, UnknownKeyError> {
        let prototype = match self.buckets.get_mut(&key) {
            None => return Err(UnknownKeyError { key }),
            Some(bucket) => match bucket.free.pop() {
                Some(id) => {
                    let instance = &mut self.instances[id.get() as usize];
                    instance.state = InstanceState::Active;
                    instance.position = 0.0;
                    instance.speed = 0.0;
                    return Ok(id);
                }
                None => bucket.prototype,
            },
        };

        // Bucket exhausted: grow by one instead of failing.
        let id = self.create_instance(key, prototype);
        self.instances[id.get() as usize].state = InstanceState::Active;
        Ok(id)
    }

    /// Returns the instance to its bucket, reporting the bucket key on an
    /// actual transition. Releasing an already-inactive instance is a no-op:
    /// the offscreen check and the completion signal may both target the same
    /// handle within one tick.
    pub(crate) fn release(&mut self, id: InstanceId) -> Option<PoolKey> {
        let instance = self.instances.get_mut(id.get() as usize)?;
        if instance.state == InstanceState::Inactive {
            return None;
        }
        instance.state = InstanceState::Inactive;
        let key = instance.key;
        if let Some(bucket) = self.buckets.get_mut(&key) {
            bucket.free.push(id);
        }
        Some(key)
    }

    pub(crate) fn force_release_all(&mut self) -> usize {
        let mut released = 0;
        for (index, instance) in self.instances.iter_mut().enumerate() {
            if instance.state == InstanceState::Active {
                instance.state = InstanceState::Inactive;
                if let Some(bucket) = self.buckets.get_mut(&instance.key) {
                    bucket.free.push(InstanceId::new(index as u32));
                }
                released += 1;
            }
        }
        released
    }

    pub(crate) fn place(&mut self, id: InstanceId, position: f32, speed: f32) {
        if let Some(instance) = self.instances.get_mut(id.get() as usize) {
            instance.position = position;
            instance.speed = speed;
        }
    }

    pub(crate) fn advance_active(&mut self, dt: f32) {
        for instance in &mut self.instances {
            if instance.state == InstanceState::Active && instance.speed != 0.0 {
                instance.position += instance.speed * dt;
            }
        }
    }

    pub(crate) fn counts(&self, key: PoolKey) -> Option<(usize, usize)> {
        let bucket = self.buckets.get(&key)?;
        let active = self
            .instances
            .iter()
            .filter(|instance| instance.key == key && instance.state == InstanceState::Active)
            .count();
        Some((active, bucket.free.len()))
    }

    pub(crate) fn iter_active(&self) -> impl Iterator<Item = (InstanceId, &Instance)> {
        self.instances
            .iter()
            .enumerate()
            .filter_map(|(index, instance)| {
                (instance.state == InstanceState::Active)
                    .then(|| (InstanceId::new(index as u32), instance))
            })
    }

    fn create_instance(&mut self, key: PoolKey, prototype: SpawnPrototype) -> InstanceId {
        let id = InstanceId::new(self.instances.len() as u32);
        self.instances.push(Instance {
            key,
            state: InstanceState::Inactive,
            position: 0.0,
            speed: 0.0,
            extent: prototype.extent(),
        });
        id
    }
}

#[cfg(test)]
mod tests {
    use super::{InstanceState, ObjectPool};
    use lane_rush_core::{ConfigurationError, PoolKey, SpawnPrototype};

    fn pool_with(key: PoolKey, initial_count: usize) -> ObjectPool {
        let mut pool = ObjectPool::new();
        pool.register(key, SpawnPrototype::new(4.0).expect("extent"), initial_count)
            .expect("registration");
        pool
    }

    #[test]
    fn duplicate_registration_is_rejected() {
        let key = PoolKey::new(1);
        let mut pool = pool_with(key, 2);
        assert_eq!(
            pool.register(key, SpawnPrototype::new(4.0).expect("extent"), 2),
            Err(ConfigurationError::DuplicatePoolKey { key })
        );
    }

    #[test]
    fn acquire_resets_transient_fields() {
        let key = PoolKey::new(1);
        let mut pool = pool_with(key, 1);
        let id = pool.acquire(key).expect("acquire");
        pool.place(id, 120.0, 6.0);
        assert_eq!(pool.release(id), Some(key));

        let id = pool.acquire(key).expect("reacquire");
        let instance = &pool.instances[id.get() as usize];
        assert_eq!(instance.position, 0.0);
        assert_eq!(instance.speed, 0.0);
    }

    #[test]
    fn exhausted_bucket_grows_by_one() {
        let key = PoolKey::new(1);
        let mut pool = pool_with(key, 1);
        let first = pool.acquire(key).expect("first");
        let second = pool.acquire(key).expect("grown");
        assert_ne!(first, second);
        assert_eq!(pool.counts(key), Some((2, 0)));

        assert_eq!(pool.release(second), Some(key));
        assert_eq!(pool.counts(key), Some((1, 1)));
    }

    #[test]
    fn double_release_leaves_counts_unchanged() {
        let key = PoolKey::new(1);
        let mut pool = pool_with(key, 2);
        let id = pool.acquire(key).expect("acquire");
        assert_eq!(pool.release(id), Some(key));
        assert_eq!(pool.release(id), None);
        assert_eq!(pool.counts(key), Some((0, 2)));
    }

    #[test]
    fn unknown_key_fails_acquire() {
        let mut pool = pool_with(PoolKey::new(1), 1);
        assert!(pool.acquire(PoolKey::new(99)).is_err());
    }

    #[test]
    fn instances_stay_in_their_bucket() {
        let first_key = PoolKey::new(1);
        let second_key = PoolKey::new(2);
        let mut pool = pool_with(first_key, 1);
        pool.register(second_key, SpawnPrototype::new(2.0).expect("extent"), 1)
            .expect("registration");

        let id = pool.acquire(second_key).expect("acquire");
        assert_eq!(pool.release(id), Some(second_key));
        assert_eq!(pool.counts(first_key), Some((0, 1)));
        assert_eq!(pool.counts(second_key), Some((0, 1)));
        assert!(pool
            .instances
            .iter()
            .all(|instance| instance.state == InstanceState::Inactive));
    }
}
