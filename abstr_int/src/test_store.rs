// SPDX-FileCopyrightText: 2024 Rot127 <unisono@quyllur.org>
// SPDX-License-Identifier: LGPL-3.0-only

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use lifted_il::{CallingConvention, Signature};

    use crate::{
        config::{AnalysisConfig, WorklistOrder},
        context::{CallContext, CallSummary, SummaryCache, SummaryKey},
        error::ConfigError,
        heap::{HeapModel, SizeFact},
        memory::{AllocId, CallSiteId, FrameId, Location, MemObject, ProgramPoint},
        products::AnalysisProducts,
        stack::StackFrame,
        store::Store,
        value::{AbstrVal, Offset},
    };

    const MAIN: u64 = 0x1000;
    const CALLEE: u64 = 0x2000;

    fn main_frame() -> FrameId {
        FrameId::new(MAIN, CallContext::new_entry(MAIN))
    }

    fn site(addr: u64) -> CallSiteId {
        CallSiteId { func: MAIN, addr }
    }

    fn alloc_at(addr: u64) -> AllocId {
        AllocId::new(site(addr), CallContext::new_entry(MAIN))
    }

    #[test]
    fn test_strong_and_weak_update() {
        let mut store = Store::new();
        let loc = Location::stack(&main_frame(), -8);
        assert_eq!(store.read(&loc), AbstrVal::Undefined);
        store.write(loc.clone(), AbstrVal::new_u64(1, 64));
        store.write(loc.clone(), AbstrVal::new_u64(2, 64));
        assert_eq!(store.read(&loc), AbstrVal::new_u64(2, 64));
        store.join_write(loc.clone(), AbstrVal::new_u64(3, 64));
        assert_eq!(store.read(&loc), AbstrVal::Top);
        store.write(loc.clone(), AbstrVal::Undefined);
        assert!(store.is_empty());
    }

    #[test]
    fn test_read_object() {
        let obj = MemObject::Alloc(alloc_at(0x1010));
        let mut store = Store::new();
        store.write(Location::heap(&alloc_at(0x1010), 0), AbstrVal::new_u64(1, 64));
        assert_eq!(
            store.read_object(&obj, Offset::Known(0), 8),
            AbstrVal::new_u64(1, 64)
        );
        assert_eq!(
            store.read_object(&obj, Offset::Unknown, 8),
            AbstrVal::new_u64(1, 64)
        );
        store.join_write(
            Location::in_object(&obj, Offset::Unknown),
            AbstrVal::new_u64(1, 64),
        );
        assert_eq!(
            store.read_object(&obj, Offset::Known(0), 8),
            AbstrVal::new_u64(1, 64)
        );
        // Unwritten offsets only see the unknown cell.
        assert_eq!(
            store.read_object(&obj, Offset::Known(8), 8),
            AbstrVal::new_u64(1, 64)
        );
        store.write(Location::heap(&alloc_at(0x1010), 8), AbstrVal::new_u64(2, 64));
        assert_eq!(store.read_object(&obj, Offset::Known(8), 8), AbstrVal::Top);
    }

    #[test]
    fn test_overlapping_cells() {
        let alloc = alloc_at(0x1010);
        let obj = MemObject::Alloc(alloc.clone());
        let mut store = Store::new();
        store.write_sized(
            Location::heap(&alloc, 0),
            AbstrVal::new_u64(0x1111111111111111, 64),
            8,
        );
        store.write_sized(Location::heap(&alloc, 1), AbstrVal::new_u64(0xff, 8), 1);
        assert_ne!(
            store.read_object(&obj, Offset::Known(0), 8),
            AbstrVal::new_u64(0x1111111111111111, 64)
        );
        assert_eq!(store.read_object(&obj, Offset::Known(0), 8), AbstrVal::Top);
        assert_eq!(
            store.read_object(&obj, Offset::Known(1), 1),
            AbstrVal::new_u64(0xff, 8)
        );
        // Wrong width.
        assert_eq!(store.read_object(&obj, Offset::Known(1), 8), AbstrVal::Top);

        // Adjacent cells stay intact.
        store.write_sized(Location::heap(&alloc, 8), AbstrVal::new_u64(2, 64), 8);
        store.write_sized(Location::heap(&alloc, 16), AbstrVal::new_u64(3, 32), 4);
        assert_eq!(
            store.read_object(&obj, Offset::Known(8), 8),
            AbstrVal::new_u64(2, 64)
        );
        assert_eq!(
            store.read_object(&obj, Offset::Known(16), 4),
            AbstrVal::new_u64(3, 32)
        );

        store.write_sized(Location::Global(0x6000), AbstrVal::new_u64(5, 64), 8);
        store.write_sized(Location::Global(0x6004), AbstrVal::new_u64(1, 8), 1);
        assert_eq!(store.read_sized(&Location::Global(0x6000), 8), AbstrVal::Top);

        // Joining cells of different widths.
        let loc = Location::heap(&alloc, 32);
        let mut a = Store::new();
        a.write_sized(loc.clone(), AbstrVal::new_u64(1, 8), 1);
        let mut b = Store::new();
        b.write_sized(loc.clone(), AbstrVal::new_u64(1, 64), 8);
        assert!(a.merge_into(&mut b));
        assert_eq!(b.read(&loc), AbstrVal::Top);
        assert_eq!(b.size_of(&loc), Some(8));
    }

    #[test]
    fn test_merge_and_widen() {
        let loc = Location::reg("rax");
        let mut a = Store::new();
        a.write(loc.clone(), AbstrVal::new_u64(1, 64));
        let mut b = Store::new();
        assert!(a.merge_into(&mut b));
        assert!(!a.merge_into(&mut b));
        assert!(a.leq(&b) && b.leq(&a));

        let mut c = Store::new();
        c.write(loc.clone(), AbstrVal::new_u64(2, 64));
        let joined = a.join(&c);
        assert_eq!(joined.read(&loc), AbstrVal::Top);
        assert!(a.leq(&joined) && c.leq(&joined));

        let mut fp = Store::new();
        fp.write(loc.clone(), AbstrVal::new_fptr(0x10));
        let mut grown = Store::new();
        grown.write(loc.clone(), AbstrVal::new_fptr(0x20));
        assert!(grown.widen_into(&mut fp));
        assert!(!fp.read(&loc).is_pointer());
        assert!(AbstrVal::new_fptr(0x30).leq(&fp.read(&loc)));
    }

    #[test]
    fn test_memory_only_and_frames() {
        let callee_frame = FrameId::new(
            CALLEE,
            CallContext::new_clone(&CallContext::new_entry(MAIN), site(0x1004), CALLEE, 1),
        );
        let mut store = Store::new();
        store.write(Location::reg("rsp"), AbstrVal::new_stack(main_frame(), 0));
        store.write(Location::stack(&main_frame(), -8), AbstrVal::new_u64(1, 64));
        store.write(Location::stack(&callee_frame, -8), AbstrVal::new_u64(2, 64));
        store.write(Location::Global(0x6000), AbstrVal::new_u64(3, 64));
        let mut mem = store.memory_only();
        assert_eq!(mem.len(), 3);
        mem.remove_frame(&callee_frame);
        assert_eq!(mem.len(), 2);
        assert_eq!(
            mem.read(&Location::stack(&main_frame(), -8)),
            AbstrVal::new_u64(1, 64)
        );
    }

    #[test]
    fn test_havoc_reachable() {
        let a = alloc_at(0x1010);
        let b = alloc_at(0x1020);
        let mut store = Store::new();
        store.write(Location::heap(&a, 0), AbstrVal::new_heap(b.clone(), 0));
        store.write(Location::heap(&b, 8), AbstrVal::new_u64(7, 64));
        store.write(Location::stack(&main_frame(), -8), AbstrVal::new_u64(1, 64));
        store.havoc_reachable(&[AbstrVal::new_heap(a.clone(), 0), AbstrVal::new_u64(0, 64)]);
        assert_eq!(store.read(&Location::heap(&a, 0)), AbstrVal::Top);
        assert_eq!(store.read(&Location::heap(&b, 8)), AbstrVal::Top);
        assert_eq!(
            store.read(&Location::in_object(&MemObject::Alloc(b), Offset::Unknown)),
            AbstrVal::Top
        );
        assert_eq!(
            store.read(&Location::stack(&main_frame(), -8)),
            AbstrVal::new_u64(1, 64)
        );
    }

    #[test]
    fn test_size_facts() {
        let five = SizeFact::from_value(&AbstrVal::new_u64(5, 64));
        assert_eq!(five, SizeFact::Const(5));
        assert!(!five.is_out_of_bounds(0, 1));
        assert!(!five.is_out_of_bounds(4, 1));
        assert!(five.is_out_of_bounds(5, 1));
        assert!(five.is_out_of_bounds(2, 4));
        assert!(five.is_out_of_bounds(-1, 1));
        assert_eq!(
            five.join(&SizeFact::Const(16)),
            SizeFact::Range { lo: 5, hi: 16 }
        );
        assert!(!five.join(&SizeFact::Const(16)).is_out_of_bounds(8, 8));
        assert_eq!(five.join(&SizeFact::Top), SizeFact::Top);
        assert!(!SizeFact::Top.is_out_of_bounds(0x1000, 8));
        assert_eq!(SizeFact::from_value(&AbstrVal::Top), SizeFact::Top);
    }

    #[test]
    fn test_heap_model() {
        let heap = HeapModel::new();
        let pp = ProgramPoint::new(MAIN, MAIN, 0x1010);
        assert!(heap
            .on_call(&Signature::rand(), &[], alloc_at(0x1010), pp)
            .is_none());
        let obj = heap
            .on_call(
                &Signature::malloc(),
                &[AbstrVal::new_u64(16, 64)],
                alloc_at(0x1010),
                pp,
            )
            .expect("malloc allocates");
        assert_eq!(obj.size_fact, SizeFact::Const(16));
        heap.on_call(
            &Signature::malloc(),
            &[AbstrVal::new_u64(32, 64)],
            alloc_at(0x1010),
            pp,
        );
        assert_eq!(heap.len(), 1);
        assert_eq!(
            heap.get(&alloc_at(0x1010)).map(|o| o.size_fact),
            Some(SizeFact::Range { lo: 16, hi: 32 })
        );
        assert!(heap.is_out_of_bounds(&alloc_at(0x1010), 32, 1));
        assert!(!heap.is_out_of_bounds(&alloc_at(0x2000), 32, 1));
    }

    #[test]
    fn test_classify_args() {
        let cc = CallingConvention::sysv_amd64();
        let args: Vec<AbstrVal> = (0..30).map(|i| AbstrVal::new_u64(i, 64)).collect();
        let frame = StackFrame::classify_args(&cc, main_frame(), 30, &args);
        assert_eq!(frame.arg_slots.len(), 30);
        for (i, reg) in ["rdi", "rsi", "rdx", "rcx", "r8", "r9"].iter().enumerate() {
            assert_eq!(frame.arg_slots[i].0, Location::reg(reg));
        }
        for i in 6..30 {
            assert_eq!(
                frame.arg_slots[i].0,
                Location::stack(&main_frame(), 8 + 8 * (i as i64 - 6))
            );
            assert_eq!(frame.arg_slots[i].1, AbstrVal::new_u64(i as u64, 64));
        }
        assert_eq!(
            frame.arg_slots[29].0,
            Location::stack(&main_frame(), 192)
        );

        let missing = StackFrame::classify_args(&cc, main_frame(), 2, &[]);
        assert_eq!(missing.arg_slots[1], (Location::reg("rsi"), AbstrVal::Top));

        let entry = frame.entry_store(&cc, Store::new());
        assert_eq!(
            entry.read(&Location::reg("rsp")),
            AbstrVal::new_stack(main_frame(), 0)
        );
        assert_eq!(entry.read(&Location::reg("r9")), AbstrVal::new_u64(5, 64));
    }

    #[test]
    fn test_call_context() {
        let entry = CallContext::new_entry(MAIN);
        assert_eq!(entry.activations(MAIN), 1);
        assert_eq!(entry.chain_len(), 1);
        let c1 = CallContext::new_clone(&entry, site(0x1004), CALLEE, 1);
        let c2 = CallContext::new_clone(&c1, CallSiteId { func: CALLEE, addr: 0x2004 }, CALLEE, 2);
        assert_eq!(c2.activations(CALLEE), 2);
        assert_eq!(c2.activations(MAIN), 1);
        assert_eq!(c2.chain_len(), 3);
        assert!(!c2.is_summary());
        let s = CallContext::new_summary(CALLEE);
        let in_s = CallContext::new_clone(&s, CallSiteId { func: CALLEE, addr: 0x2008 }, MAIN, 1);
        assert!(in_s.in_summary_of(CALLEE));
        assert!(!in_s.in_summary_of(MAIN));
        assert!(in_s.is_summary());
        assert_ne!(
            CallContext::new_clone(&entry, site(0x1004), CALLEE, 1),
            CallContext::new_clone(&entry, site(0x1008), CALLEE, 1)
        );
    }

    #[test]
    fn test_summary_cache() {
        let cache = SummaryCache::new();
        let key = SummaryKey {
            callee: CALLEE,
            ctx: CallContext::new_summary(CALLEE),
            entry: Store::new(),
        };
        let summary = CallSummary {
            ret: AbstrVal::new_u64(1, 64),
            exit: Some(Store::new()),
            unknown_writes: false,
            products: AnalysisProducts::new(),
        };
        let first = cache
            .fetch_or_analyze(key.clone(), || Ok(summary.clone()))
            .expect("analysed");
        let second = cache
            .fetch_or_analyze(key, || panic!("must be memoized"))
            .expect("memoized");
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get_hits(), 1);
        assert_eq!(cache.get_misses(), 1);
    }

    #[test]
    fn test_config() {
        let mut conf = AnalysisConfig::default();
        assert_eq!(conf.clone_depth, 2);
        conf.set_conf_val(AnalysisConfig::KEY_CLONE_DEPTH, "3")
            .expect("valid");
        conf.set_conf_val(AnalysisConfig::KEY_WORKLIST, "shuffle:42")
            .expect("valid");
        assert_eq!(conf.clone_depth, 3);
        assert_eq!(conf.worklist_order, WorklistOrder::Shuffled(42));
        assert_eq!(
            conf.get_conf_val(AnalysisConfig::KEY_WORKLIST).as_deref(),
            Some("shuffle:42")
        );
        assert!(matches!(
            conf.set_conf_val(AnalysisConfig::KEY_CLONE_DEPTH, "0"),
            Err(ConfigError::InvalidValue { .. })
        ));
        assert!(matches!(
            conf.set_conf_val(AnalysisConfig::KEY_WIDEN_AFTER, "many"),
            Err(ConfigError::InvalidValue { .. })
        ));
        assert_eq!(
            conf.set_conf_val("absint.nope", "1"),
            Err(ConfigError::UnknownKey("absint.nope".to_owned()))
        );
        assert_eq!(WorklistOrder::parse("fifo"), Some(WorklistOrder::Fifo));
        assert_eq!(WorklistOrder::parse("shuffle:x"), None);
    }
}
