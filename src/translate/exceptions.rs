//! Exception table reconstruction
//!
//! The exception table is turned into dispatchers: native code blocks that receive a pending
//! exception and route it to the right handler, or leave it pending for the caller. Routing must
//! match the JVM exactly, which picks the first entry of the table (in declaration order) that
//! covers the throwing instruction and accepts the exception.

use crate::jvm::model::ExceptionHandlerRange;
use crate::jvm::BinaryName;
use crate::util::Offset;
use std::collections::{BTreeSet, HashMap};

/// How dispatchers are laid out
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum Layout {
    /// Ranges form a tree where inner ranges are declared first. Each range gets a dispatcher
    /// which falls back to the dispatcher of the enclosing range.
    Nested,
    /// Ranges overlap in some other way. Each distinct chain of covering handlers gets its own
    /// flat dispatcher.
    DispatchTable,
}

/// Dispatcher before catch types are turned into symbols
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct DispatcherPlan {
    /// Tested in order, `None` catches everything
    pub handlers: Vec<(Option<BinaryName>, Offset)>,
    pub fallback: Option<usize>,
}

#[derive(Clone, PartialEq, Eq, Debug)]
struct Segment {
    start: Offset,
    end: Offset,
    dispatcher: usize,
}

/// Dispatchers of a method and the code segments they cover
#[derive(Clone, Debug)]
pub struct ExceptionRegions {
    pub layout: Layout,
    pub dispatchers: Vec<DispatcherPlan>,
    /// Sorted and disjoint
    segments: Vec<Segment>,
}

impl ExceptionRegions {
    pub fn analyze(handlers: &[ExceptionHandlerRange]) -> ExceptionRegions {
        // Group handlers by range, in order of first declaration
        let mut groups: Vec<(Offset, Offset, Vec<usize>)> = vec![];
        for (idx, handler) in handlers.iter().enumerate() {
            match groups
                .iter_mut()
                .find(|(start, end, _)| *start == handler.start && *end == handler.end)
            {
                Some((_, _, members)) => members.push(idx),
                None => groups.push((handler.start, handler.end, vec![idx])),
            }
        }

        let nested = groups.iter().enumerate().all(|(i, (s1, e1, m1))| {
            groups.iter().enumerate().all(|(j, (s2, e2, m2))| {
                if i == j || e1 <= s2 || e2 <= s1 {
                    return true;
                }
                let inner_first = |inner: &[usize], outer: &[usize]| {
                    inner.iter().max() < outer.iter().min()
                };
                if s1 <= s2 && e2 <= e1 {
                    inner_first(m2, m1)
                } else if s2 <= s1 && e1 <= e2 {
                    inner_first(m1, m2)
                } else {
                    false
                }
            })
        });

        let mut points = BTreeSet::new();
        for handler in handlers {
            points.insert(handler.start);
            points.insert(handler.end);
        }
        let points: Vec<Offset> = points.into_iter().collect();
        let elementary = points.windows(2).map(|window| (window[0], window[1]));

        let entry = |idx: usize| {
            let handler = &handlers[idx];
            (handler.catch_type.clone(), handler.handler)
        };

        let mut dispatchers = vec![];
        let mut segments: Vec<Segment> = vec![];
        let mut push_segment = |start: Offset, end: Offset, dispatcher: usize| match segments
            .last_mut()
        {
            Some(last) if last.end == start && last.dispatcher == dispatcher => last.end = end,
            _ => segments.push(Segment {
                start,
                end,
                dispatcher,
            }),
        };

        if nested {
            // Parent of a group is the smallest group strictly containing it
            let parents: Vec<Option<usize>> = groups
                .iter()
                .map(|(start, end, _)| {
                    groups
                        .iter()
                        .enumerate()
                        .filter(|(_, (s, e, _))| {
                            s <= start && end <= e && (s, e) != (start, end)
                        })
                        .min_by_key(|(_, (s, e, _))| e.0 - s.0)
                        .map(|(idx, _)| idx)
                })
                .collect();
            for ((_, _, members), parent) in groups.iter().zip(&parents) {
                dispatchers.push(DispatcherPlan {
                    handlers: members.iter().map(|idx| entry(*idx)).collect(),
                    fallback: *parent,
                });
            }
            for (start, end) in elementary {
                let innermost = groups
                    .iter()
                    .enumerate()
                    .filter(|(_, (s, e, _))| *s <= start && end <= *e)
                    .min_by_key(|(_, (s, e, _))| e.0 - s.0)
                    .map(|(idx, _)| idx);
                if let Some(group) = innermost {
                    push_segment(start, end, group);
                }
            }
            ExceptionRegions {
                layout: Layout::Nested,
                dispatchers,
                segments,
            }
        } else {
            let mut chains: HashMap<Vec<usize>, usize> = HashMap::new();
            for (start, end) in elementary {
                let chain: Vec<usize> = handlers
                    .iter()
                    .enumerate()
                    .filter(|(_, handler)| handler.start <= start && end <= handler.end)
                    .map(|(idx, _)| idx)
                    .collect();
                if chain.is_empty() {
                    continue;
                }
                let dispatcher = *chains.entry(chain.clone()).or_insert_with(|| {
                    dispatchers.push(DispatcherPlan {
                        handlers: chain.iter().map(|idx| entry(*idx)).collect(),
                        fallback: None,
                    });
                    dispatchers.len() - 1
                });
                push_segment(start, end, dispatcher);
            }
            ExceptionRegions {
                layout: Layout::DispatchTable,
                dispatchers,
                segments,
            }
        }
    }

    /// Dispatcher receiving exceptions raised at `offset`, if any handler covers it
    pub fn dispatcher_at(&self, offset: Offset) -> Option<usize> {
        let idx = self
            .segments
            .partition_point(|segment| segment.end <= offset);
        self.segments
            .get(idx)
            .filter(|segment| segment.start <= offset)
            .map(|segment| segment.dispatcher)
    }

    /// Handler receiving an exception thrown at `offset`
    ///
    /// `is_instance(thrown, catch_type)` decides whether a handler accepts the exception.
    pub fn dispatch<T>(
        &self,
        offset: Offset,
        thrown: &T,
        mut is_instance: impl FnMut(&T, &BinaryName) -> bool,
    ) -> Option<Offset> {
        let mut current = self.dispatcher_at(offset);
        while let Some(idx) = current {
            let dispatcher = &self.dispatchers[idx];
            for (catch_type, handler) in &dispatcher.handlers {
                match catch_type {
                    None => return Some(*handler),
                    Some(class) if is_instance(thrown, class) => return Some(*handler),
                    Some(_) => (),
                }
            }
            current = dispatcher.fallback;
        }
        None
    }
}

/// The JVM's own routing: the first covering entry that accepts the exception
pub fn reference_dispatch<T>(
    handlers: &[ExceptionHandlerRange],
    offset: Offset,
    thrown: &T,
    mut is_instance: impl FnMut(&T, &BinaryName) -> bool,
) -> Option<Offset> {
    handlers
        .iter()
        .find(|handler| {
            handler.covers(offset)
                && match &handler.catch_type {
                    None => true,
                    Some(class) => is_instance(thrown, class),
                }
        })
        .map(|handler| handler.handler)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::jvm::Name;

    fn class(name: &str) -> BinaryName {
        BinaryName::from_string(name.to_owned()).unwrap()
    }

    fn range(start: usize, end: usize, handler: usize, catch: Option<&str>) -> ExceptionHandlerRange {
        ExceptionHandlerRange {
            start: Offset(start),
            end: Offset(end),
            handler: Offset(handler),
            catch_type: catch.map(class),
        }
    }

    /// Exceptions named `A...` are subclasses of `A`
    fn is_instance(thrown: &&str, catch: &BinaryName) -> bool {
        thrown.starts_with(catch.as_str())
    }

    fn agrees_with_reference(handlers: &[ExceptionHandlerRange]) {
        let regions = ExceptionRegions::analyze(handlers);
        for offset in 0..40 {
            for thrown in ["A", "AB", "B", "C"] {
                assert_eq!(
                    regions.dispatch(Offset(offset), &thrown, is_instance),
                    reference_dispatch(handlers, Offset(offset), &thrown, is_instance),
                    "offset {} thrown {}",
                    offset,
                    thrown
                );
            }
        }
    }

    #[test]
    fn overlapping_ranges_keep_declaration_priority() {
        let handlers = vec![range(0, 10, 100, Some("A")), range(5, 15, 200, None)];
        let regions = ExceptionRegions::analyze(&handlers);
        assert_eq!(regions.layout, Layout::DispatchTable);
        assert_eq!(regions.dispatch(Offset(7), &"A", is_instance), Some(Offset(100)));
        assert_eq!(regions.dispatch(Offset(7), &"B", is_instance), Some(Offset(200)));
        assert_eq!(regions.dispatch(Offset(3), &"B", is_instance), None);
        assert_eq!(regions.dispatch(Offset(12), &"A", is_instance), Some(Offset(200)));
        assert_eq!(regions.dispatch(Offset(15), &"A", is_instance), None);
        agrees_with_reference(&handlers);
    }

    #[test]
    fn nested_ranges_fall_back_outwards() {
        let handlers = vec![
            range(4, 8, 100, Some("AB")),
            range(4, 8, 110, Some("B")),
            range(2, 20, 200, Some("A")),
            range(24, 30, 300, None),
            range(0, 20, 400, None),
        ];
        let regions = ExceptionRegions::analyze(&handlers);
        assert_eq!(regions.layout, Layout::Nested);
        assert_eq!(regions.dispatchers.len(), 4);
        assert_eq!(regions.dispatchers[0].handlers.len(), 2);
        assert_eq!(regions.dispatchers[0].fallback, Some(1));
        assert_eq!(regions.dispatchers[1].fallback, Some(3));
        assert_eq!(regions.dispatchers[3].fallback, None);
        assert_eq!(regions.dispatcher_at(Offset(5)), Some(0));
        assert_eq!(regions.dispatcher_at(Offset(1)), Some(3));
        assert_eq!(regions.dispatcher_at(Offset(22)), None);
        agrees_with_reference(&handlers);
    }

    #[test]
    fn outer_range_declared_first_is_not_nested() {
        let handlers = vec![range(0, 20, 100, Some("A")), range(5, 10, 200, None)];
        let regions = ExceptionRegions::analyze(&handlers);
        assert_eq!(regions.layout, Layout::DispatchTable);
        assert_eq!(regions.dispatch(Offset(6), &"AB", is_instance), Some(Offset(100)));
        agrees_with_reference(&handlers);
    }

    #[test]
    fn no_handlers() {
        let regions = ExceptionRegions::analyze(&[]);
        assert!(regions.dispatchers.is_empty());
        assert_eq!(regions.dispatcher_at(Offset(0)), None);
    }
}
