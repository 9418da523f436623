//! Integration test for the pool registry lifecycle.

use respawn_core::{
    FnPrototype, LifecycleEvent, Parent, PoolConfig, PoolError, PoolRegistry, PoolStatus,
    Poolable, Prototype,
};
use respawn_shared::{Transform, Vec3};
use std::sync::Arc;
use std::time::Duration;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
enum Kind {
    Turret,
    Shell,
    Crater,
}

#[derive(Debug, Default)]
struct Prop {
    uses: u32,
    returns: u32,
}

impl Poolable for Prop {
    fn on_get_from_pool(&mut self) {
        self.uses += 1;
    }

    fn on_return_to_pool(&mut self) {
        self.returns += 1;
    }
}

fn proto(kind: Kind) -> Arc<dyn Prototype<Kind, Prop>> {
    Arc::new(FnPrototype::new(kind, Prop::default))
}

const FRAME: Duration = Duration::from_millis(16);

#[test]
fn test_pools_prewarm_side_by_side() {
    let mut registry: PoolRegistry<Kind, Prop> = PoolRegistry::new();
    registry
        .create_pool(proto(Kind::Turret), PoolConfig::new(7, 10, false), true)
        .unwrap();
    registry
        .create_pool(proto(Kind::Shell), PoolConfig::new(3, 10, true), true)
        .unwrap();

    // Both pools get one batch per frame.
    assert_eq!(registry.tick(FRAME), 2);
    assert!(!registry.is_ready(&Kind::Turret));
    assert!(registry.is_ready(&Kind::Shell));

    assert_eq!(registry.tick(FRAME), 1);
    assert!(registry.is_ready(&Kind::Turret));

    let stats = registry.all_stats();
    assert_eq!(stats.len(), 2);
    assert_eq!(stats[0].key, Kind::Turret);
    assert_eq!(stats[0].total, 7);
    assert_eq!(stats[1].key, Kind::Shell);
    assert_eq!(stats[1].total, 3);
    assert!(stats.iter().all(|s| s.status == PoolStatus::Ready && s.prewarmed));
}

#[test]
fn test_get_during_prewarm_uses_created_instances() {
    let mut registry: PoolRegistry<Kind, Prop> = PoolRegistry::new();
    registry
        .create_pool(proto(Kind::Shell), PoolConfig::new(10, 10, true), true)
        .unwrap();

    assert!(matches!(
        registry.get(&Kind::Shell),
        Err(PoolError::NotReady(_))
    ));

    registry.tick(FRAME);
    let mut taken = Vec::new();
    for _ in 0..5 {
        taken.push(registry.get(&Kind::Shell).unwrap());
    }
    assert!(matches!(
        registry.get(&Kind::Shell),
        Err(PoolError::NotReady(_))
    ));

    registry.tick(FRAME);
    assert!(registry.is_ready(&Kind::Shell));
    let stats = registry.get_stats(&Kind::Shell).unwrap();
    assert_eq!(stats.total, 10);
    assert_eq!(stats.in_use(), 5);
}

#[test]
fn test_returned_instances_come_back_inert() {
    let mut registry: PoolRegistry<Kind, Prop> = PoolRegistry::new();
    registry
        .create_pool(proto(Kind::Crater), PoolConfig::new(1, 1, false), true)
        .unwrap();
    registry.finish_pending_creation();

    let id = registry.get(&Kind::Crater).unwrap();
    {
        let node = registry.instance_mut(id).unwrap();
        assert!(node.is_active());
        assert_eq!(node.parent(), Parent::World);
        node.transform = Transform::at(Vec3::new(4.0, 0.0, -2.0));
        node.motion.linear = Vec3::new(0.0, 9.0, 0.0);
    }
    registry.return_instance(id).unwrap();

    let node = registry.instance(id).unwrap();
    assert!(node.is_inert());
    assert_eq!(node.parent(), Parent::Storage);
    assert_eq!(node.value().uses, 1);
    assert_eq!(node.value().returns, 1);

    let again = registry.get(&Kind::Crater).unwrap();
    assert_eq!(again, id);
    assert!(registry.instance(again).unwrap().transform.is_identity());
}

#[test]
fn test_exhausted_pool_reports_totals() {
    let mut registry: PoolRegistry<Kind, Prop> = PoolRegistry::new();
    registry
        .create_pool(proto(Kind::Turret), PoolConfig::new(2, 2, false), true)
        .unwrap();
    registry.finish_pending_creation();

    registry.get(&Kind::Turret).unwrap();
    registry.get(&Kind::Turret).unwrap();
    match registry.get(&Kind::Turret) {
        Err(PoolError::Exhausted { total, max, .. }) => {
            assert_eq!(total, 2);
            assert_eq!(max, 2);
        }
        other => panic!("expected exhaustion, got {other:?}"),
    }
    assert_eq!(registry.tracked_count(), 2);
}

#[test]
fn test_children_are_released_with_their_parent() {
    let mut registry: PoolRegistry<Kind, Prop> = PoolRegistry::new();
    registry
        .create_pool(proto(Kind::Turret), PoolConfig::new(1, 1, false), true)
        .unwrap();
    registry
        .create_pool(proto(Kind::Shell), PoolConfig::new(3, 3, false), true)
        .unwrap();
    registry.finish_pending_creation();

    let turret = registry.get(&Kind::Turret).unwrap();
    let shells: Vec<_> = (0..3)
        .map(|_| registry.get(&Kind::Shell).unwrap())
        .collect();
    for &shell in &shells {
        registry.attach(shell, turret).unwrap();
    }
    assert_eq!(registry.children(turret), shells);

    registry.return_instance(turret).unwrap();
    for &shell in &shells {
        assert!(registry.is_tracked(shell));
        assert_eq!(registry.instance(shell).unwrap().parent(), Parent::World);
    }

    registry.detach(shells[0]);
    for shell in shells {
        registry.return_instance(shell).unwrap();
    }
    assert_eq!(registry.get_stats(&Kind::Shell).unwrap().available, 3);
}

#[test]
fn test_stale_handles_after_rebuild_are_rejected() {
    let mut registry: PoolRegistry<Kind, Prop> = PoolRegistry::new();
    registry
        .create_pool(proto(Kind::Shell), PoolConfig::new(2, 2, false), true)
        .unwrap();
    registry.finish_pending_creation();
    let old = registry.get(&Kind::Shell).unwrap();

    registry.clear_pool(&Kind::Shell);
    registry
        .create_pool(proto(Kind::Shell), PoolConfig::new(2, 2, false), true)
        .unwrap();
    registry.finish_pending_creation();

    assert!(registry.instance(old).is_none());
    assert!(matches!(
        registry.return_instance(old),
        Err(PoolError::NotTracked(_))
    ));
    let pool = registry.get_pool_mut(&Kind::Shell).unwrap();
    assert!(matches!(
        pool.return_instance(old),
        Err(PoolError::ForeignInstance { .. })
    ));
}

#[test]
fn test_cleared_pool_emits_event_and_cancels_creation() {
    let mut registry: PoolRegistry<Kind, Prop> = PoolRegistry::new();
    let events = registry.subscribe();
    registry
        .create_pool(proto(Kind::Crater), PoolConfig::new(50, 50, false), true)
        .unwrap();
    registry.tick(FRAME);
    registry.tick(FRAME);
    registry.clear_pool(&Kind::Crater);

    for _ in 0..20 {
        registry.tick(FRAME);
    }
    assert!(!registry.has_pool(&Kind::Crater));

    let seen: Vec<_> = events.try_iter().collect();
    let created = seen
        .iter()
        .filter(|e| matches!(e, LifecycleEvent::ObjectCreated { .. }))
        .count();
    assert_eq!(created, 10);
    assert_eq!(
        seen.last(),
        Some(&LifecycleEvent::PoolCleared {
            pool: Kind::Crater,
            destroyed: 10
        })
    );
}
