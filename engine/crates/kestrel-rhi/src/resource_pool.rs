use std::marker::PhantomData;

use crate::handle::Handle;

struct Slot<R> {
    resource: Option<R>,
    generation: u32,
}

/// 基于 generational index 的资源表
///
/// - 分配：优先复用最近释放的 slot（LIFO），保留该 slot 当前的 generation
/// - 释放：调用销毁回调（恰好一次），清空 slot，generation + 1
///
/// pool 被 drop 时不会销毁仍然存活的资源，需要持有者在 teardown 时调用 `destroy_all`
pub struct ResourcePool<Tag, R> {
    slots: Vec<Slot<R>>,
    free_list: Vec<u32>,
    destroy_fn: Box<dyn FnMut(R)>,

    _tag: PhantomData<fn() -> Tag>,
}

// 创建
impl<Tag, R> ResourcePool<Tag, R> {
    pub fn new(destroy_fn: impl FnMut(R) + 'static) -> Self {
        Self {
            slots: Vec::new(),
            free_list: Vec::new(),
            destroy_fn: Box::new(destroy_fn),
            _tag: PhantomData,
        }
    }
}

// 分配与释放
impl<Tag, R> ResourcePool<Tag, R> {
    pub fn allocate(&mut self, resource: R) -> Handle<Tag> {
        if let Some(id) = self.free_list.pop() {
            let slot = &mut self.slots[id as usize];
            debug_assert!(slot.resource.is_none(), "free list points to an occupied slot");
            slot.resource = Some(resource);
            return Handle::new(id, slot.generation);
        }

        let id = self.slots.len() as u32;
        debug_assert!(id != Handle::<Tag>::NULL_ID, "resource pool exhausted the id space");
        self.slots.push(Slot {
            resource: Some(resource),
            generation: 0,
        });
        Handle::new(id, 0)
    }

    /// 过期或者 null 的句柄不做任何事
    pub fn free(&mut self, handle: Handle<Tag>) {
        if !self.is_valid_handle(handle) {
            return;
        }

        let slot = &mut self.slots[handle.id() as usize];
        if let Some(resource) = slot.resource.take() {
            (self.destroy_fn)(resource);
        }
        slot.generation = slot.generation.wrapping_add(1);
        self.free_list.push(handle.id());
    }

    /// 释放所有存活的资源，用于 teardown
    pub fn destroy_all(&mut self) {
        let live = self.handles();
        for handle in live {
            self.free(handle);
        }
    }
}

// 查询
impl<Tag, R> ResourcePool<Tag, R> {
    #[inline]
    pub fn is_valid_handle(&self, handle: Handle<Tag>) -> bool {
        self.slots
            .get(handle.id() as usize)
            .is_some_and(|slot| slot.generation == handle.generation() && slot.resource.is_some())
    }

    /// 返回的引用在下一次 free/allocate 之前有效
    #[inline]
    pub fn get(&self, handle: Handle<Tag>) -> Option<&R> {
        self.slots
            .get(handle.id() as usize)
            .filter(|slot| slot.generation == handle.generation())
            .and_then(|slot| slot.resource.as_ref())
    }

    #[inline]
    pub fn get_mut(&mut self, handle: Handle<Tag>) -> Option<&mut R> {
        self.slots
            .get_mut(handle.id() as usize)
            .filter(|slot| slot.generation == handle.generation())
            .and_then(|slot| slot.resource.as_mut())
    }

    /// 存活资源的数量
    #[inline]
    pub fn len(&self) -> usize {
        self.slots.len() - self.free_list.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn iter(&self) -> impl Iterator<Item = (Handle<Tag>, &R)> {
        self.slots.iter().enumerate().filter_map(|(id, slot)| {
            slot.resource.as_ref().map(|resource| (Handle::new(id as u32, slot.generation), resource))
        })
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (Handle<Tag>, &mut R)> {
        self.slots.iter_mut().enumerate().filter_map(|(id, slot)| {
            let generation = slot.generation;
            slot.resource.as_mut().map(|resource| (Handle::new(id as u32, generation), resource))
        })
    }

    fn handles(&self) -> Vec<Handle<Tag>> {
        self.iter().map(|(handle, _)| handle).collect()
    }
}

impl<Tag, R> Drop for ResourcePool<Tag, R> {
    fn drop(&mut self) {
        if !self.is_empty() {
            log::warn!(
                "resource pool<{}> dropped with {} live resources",
                std::any::type_name::<Tag>(),
                self.len()
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use super::*;

    enum TestTag {}

    fn tracked_pool() -> (ResourcePool<TestTag, &'static str>, Rc<RefCell<Vec<&'static str>>>) {
        let destroyed = Rc::new(RefCell::new(Vec::new()));
        let sink = destroyed.clone();
        (ResourcePool::new(move |r| sink.borrow_mut().push(r)), destroyed)
    }

    #[test]
    fn test_allocate_free_reallocate_scenario() {
        let (mut pool, destroyed) = tracked_pool();

        let a = pool.allocate("A");
        let b = pool.allocate("B");
        assert_eq!((a.id(), a.generation()), (0, 0));
        assert_eq!((b.id(), b.generation()), (1, 0));

        pool.free(a);
        assert_eq!(*destroyed.borrow(), vec!["A"]);

        let c = pool.allocate("C");
        assert_eq!((c.id(), c.generation()), (0, 1));

        assert_eq!(pool.get(a), None);
        assert_eq!(pool.get(c), Some(&"C"));
        assert_eq!(pool.get(b), Some(&"B"));

        pool.destroy_all();
    }

    #[test]
    fn test_stale_handle_invalid_after_reuse() {
        let (mut pool, _) = tracked_pool();
        let first = pool.allocate("first");
        pool.free(first);
        assert!(!pool.is_valid_handle(first));

        let second = pool.allocate("second");
        assert_eq!(second.id(), first.id());
        assert_eq!(second.generation(), first.generation() + 1);
        assert!(!pool.is_valid_handle(first));
        assert!(pool.is_valid_handle(second));
        pool.destroy_all();
    }

    #[test]
    fn test_free_is_noop_for_stale_and_null() {
        let (mut pool, destroyed) = tracked_pool();
        let a = pool.allocate("A");
        pool.free(a);
        pool.free(a);
        pool.free(Handle::null());
        assert_eq!(destroyed.borrow().len(), 1);
        assert!(pool.is_empty());
    }

    #[test]
    fn test_free_list_is_lifo() {
        let (mut pool, _) = tracked_pool();
        let handles = ["0", "1", "2"].map(|r| pool.allocate(r));
        pool.free(handles[0]);
        pool.free(handles[2]);

        assert_eq!(pool.allocate("x").id(), 2);
        assert_eq!(pool.allocate("y").id(), 0);
        assert_eq!(pool.allocate("z").id(), 3);
        pool.destroy_all();
    }

    #[test]
    fn test_out_of_range_handle() {
        let (mut pool, _) = tracked_pool();
        let far = Handle::<TestTag>::new(42, 0);
        assert!(!pool.is_valid_handle(far));
        assert!(pool.get(far).is_none());
        assert!(pool.get_mut(far).is_none());
    }

    #[test]
    fn test_get_mut_and_iter() {
        let mut pool: ResourcePool<TestTag, u32> = ResourcePool::new(|_| ());
        let a = pool.allocate(1);
        let b = pool.allocate(2);
        *pool.get_mut(a).unwrap() += 10;
        pool.free(b);

        let live: Vec<_> = pool.iter().map(|(h, r)| (h, *r)).collect();
        assert_eq!(live, vec![(a, 11)]);
        assert_eq!(pool.len(), 1);

        pool.iter_mut().for_each(|(_, r)| *r *= 2);
        assert_eq!(pool.get(a), Some(&22));
        pool.destroy_all();
    }

    #[test]
    fn test_destroy_all_invokes_callback_once_per_live_entry() {
        let (mut pool, destroyed) = tracked_pool();
        let a = pool.allocate("A");
        pool.allocate("B");
        pool.allocate("C");
        pool.free(a);

        pool.destroy_all();
        let mut names = destroyed.borrow().clone();
        names.sort();
        assert_eq!(names, vec!["A", "B", "C"]);
        assert!(pool.is_empty());

        pool.destroy_all();
        assert_eq!(destroyed.borrow().len(), 3);
    }
}
