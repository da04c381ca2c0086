//! Property tests over randomly generated event logs.

use std::collections::BTreeSet;

use chrono::{TimeZone, Utc};
use process_engine::miners::{DependencyMatrix, Footprint, LoopKind, Relation};
use process_engine::{
  discover, Algorithm, Config, Event, EventLog, InsightDetector, InsightMetric, MetricsEngine,
  OutlierRule, TimeUnit,
};
use proptest::prelude::*;

// ---------------------------------------------------------------------------
// Helpers / Strategies
// ---------------------------------------------------------------------------

const ACTIVITIES: [&str; 5] = ["A", "B", "C", "D", "E"];

/// One trace: 1..8 activities drawn from a small alphabet, with small time gaps.
fn arb_trace() -> impl Strategy<Value = Vec<(usize, i64)>> {
  prop::collection::vec((0..ACTIVITIES.len(), 1i64..600), 1..8)
}

fn arb_traces() -> impl Strategy<Value = Vec<Vec<(usize, i64)>>> {
  prop::collection::vec(arb_trace(), 1..12)
}

fn build_log(traces: &[Vec<(usize, i64)>]) -> EventLog {
  let mut events = Vec::new();
  for (c, trace) in traces.iter().enumerate() {
    let mut at = 1_700_000_000i64;
    for &(a, gap) in trace {
      at += gap;
      events.push(
        Event::new(&format!("c{c}"), ACTIVITIES[a], Utc.timestamp_opt(at, 0).unwrap())
          .with_user(if gap % 2 == 0 { "even" } else { "odd" }),
      );
    }
  }
  EventLog::from_events(events).unwrap()
}

fn config(algorithm: Algorithm) -> Config {
  Config {
    algorithm,
    ..Config::default()
  }
}

// ---------------------------------------------------------------------------
// Properties
// ---------------------------------------------------------------------------

proptest! {
  #[test]
  fn every_miner_is_a_subset_of_simple(traces in arb_traces()) {
    let log = build_log(&traces);
    let simple = discover(&log, &config(Algorithm::Simple)).unwrap().edge_set();
    for algorithm in Algorithm::ALL {
      let edges = discover(&log, &config(algorithm)).unwrap().edge_set();
      prop_assert!(edges.is_subset(&simple), "{} added an unobserved edge", algorithm);
    }
  }

  #[test]
  fn transition_counts_are_conserved(traces in arb_traces()) {
    let log = build_log(&traces);
    let metrics = MetricsEngine::new(TimeUnit::Second, None).compute(&log).unwrap();
    for activity in log.activities() {
      let outgoing: u64 = metrics.transitions.from_source(activity).map(|t| t.count).sum();
      let followed: u64 = log
        .traces()
        .map(|t| {
          let acts: Vec<&str> = t.activities().collect();
          acts.windows(2).filter(|w| w[0] == activity.as_str()).count() as u64
        })
        .sum();
      prop_assert_eq!(outgoing, followed);
    }
    let total: u64 = metrics.transitions.values().map(|t| t.count).sum();
    prop_assert_eq!(total as usize, log.event_count() - log.case_count());
  }

  #[test]
  fn discovery_and_metrics_are_deterministic(traces in arb_traces()) {
    let log = build_log(&traces);
    for algorithm in Algorithm::ALL {
      let a = discover(&log, &config(algorithm)).unwrap();
      let b = discover(&log, &config(algorithm)).unwrap();
      prop_assert_eq!(a, b);
    }
    let engine = MetricsEngine::new(TimeUnit::Minute, None);
    prop_assert_eq!(engine.compute(&log).unwrap(), engine.compute(&log).unwrap());
  }

  #[test]
  fn dependency_is_bounded_and_antisymmetric(traces in arb_traces()) {
    let log = build_log(&traces);
    let m = DependencyMatrix::from_log(&log);
    for a in log.activities() {
      for b in log.activities() {
        let d = m.dependency(a, b).unwrap();
        prop_assert!((-1.0..1.0).contains(&d));
        if a != b {
          let r = m.dependency(b, a).unwrap();
          prop_assert!((d + r).abs() < 1e-12);
        }
      }
    }
  }

  #[test]
  fn footprint_is_a_consistent_partition(traces in arb_traces()) {
    let log = build_log(&traces);
    let fp = Footprint::from_log(&log);
    for a in log.activities() {
      for b in log.activities() {
        let ab = fp.relation(a, b).unwrap();
        let ba = fp.relation(b, a).unwrap();
        let mirrored = match ab {
          Relation::Follows => Relation::Precedes,
          Relation::Precedes => Relation::Follows,
          other => other,
        };
        prop_assert_eq!(ba, mirrored);
      }
    }
  }

  #[test]
  fn alpha_plus_footprint_overrides_only_at_loops(traces in arb_traces()) {
    let log = build_log(&traces);
    let fp = Footprint::from_log_plus(&log);
    let self_follows: BTreeSet<&str> = log
      .traces()
      .flat_map(|t| {
        let acts: Vec<&str> = t.activities().collect();
        acts
          .windows(2)
          .filter(|w| w[0] == w[1])
          .map(|w| w[0])
          .collect::<Vec<_>>()
      })
      .collect();

    for a in log.activities() {
      let one_loop = self_follows.contains(a.as_str());
      let aa = fp.relation(a, a);
      prop_assert!(aa.is_some());
      prop_assert_eq!(fp.loop_kind(a, a) == Some(LoopKind::LengthOne), one_loop);
      prop_assert_eq!(aa == Some(Relation::Follows), one_loop);

      for b in log.activities().iter().filter(|b| *b != a) {
        let ab = fp.relation(a, b).unwrap();
        let ba = fp.relation(b, a).unwrap();
        match fp.loop_kind(a, b) {
          Some(kind) => {
            prop_assert_eq!(kind, LoopKind::LengthTwo);
            prop_assert_eq!(fp.loop_kind(b, a), Some(LoopKind::LengthTwo));
            prop_assert_eq!((ab, ba), (Relation::Follows, Relation::Follows));
          }
          None => {
            prop_assert_eq!(fp.loop_kind(b, a), None);
            let mirrored = match ab {
              Relation::Follows => Relation::Precedes,
              Relation::Precedes => Relation::Follows,
              other => other,
            };
            prop_assert_eq!(ba, mirrored);
          }
        }
      }
    }
  }

  #[test]
  fn insights_flag_only_graph_elements_and_are_stable(traces in arb_traces(), k in 1usize..4) {
    let log = build_log(&traces);
    let graph = discover(&log, &config(Algorithm::Simple)).unwrap();
    let metrics = MetricsEngine::default().compute(&log).unwrap();
    let detector = InsightDetector::new(OutlierRule::TopK { k }, InsightMetric::ALL.to_vec()).unwrap();

    let first = detector.detect(&graph, &metrics);
    let second = detector.detect(&graph, &metrics);
    prop_assert_eq!(&first, &second);

    let elements: BTreeSet<String> = graph
      .activity_nodes()
      .map(|n| n.name.clone())
      .chain(
        graph
          .activity_edges()
          .map(|e| format!("{} -> {}", graph.name(e.source), graph.name(e.target))),
      )
      .collect();
    for insight in first.iter().filter(|i| i.outlier) {
      prop_assert!(elements.contains(&insight.element.to_string()));
    }
  }
}
