//! End-to-end engine scenarios over real scratch repositories

mod common;

use common::{python_functions, TestRepo};
use shannon_insight::{Engine, Finding, FindingKind, HistoryDb, InsightConfig, Tier};

fn run(repo: &TestRepo) -> shannon_insight::RunOutcome {
    let config = InsightConfig::load(repo.path()).expect("load config");
    Engine::new(config).run(repo.path()).expect("engine run")
}

fn findings_of_kind<'a>(findings: &'a [Finding], kind: FindingKind) -> Vec<&'a Finding> {
    findings.iter().filter(|f| f.kind == kind).collect()
}

#[test]
fn orphan_detection() {
    let repo = TestRepo::new();
    repo.write("a.py", "def helper(x):\n    return x + 1\n");
    repo.write(
        "b.py",
        "def main():\n    print('hi')\n\nif __name__ == \"__main__\":\n    main()\n",
    );

    let outcome = run(&repo);
    let orphans = findings_of_kind(&outcome.snapshot.findings, FindingKind::OrphanCode);
    assert_eq!(orphans.len(), 1);
    assert_eq!(orphans[0].entities, vec!["a.py".to_string()]);
    assert!(orphans[0].entities.iter().all(|e| e != "b.py"));
    assert!(!orphans[0].evidence.is_empty());
}

#[test]
fn hidden_coupling_without_structural_edge() {
    let mut repo = TestRepo::new();
    repo.git_init();
    for name in ["u.py", "v.py", "w.py", "x.py"] {
        repo.write(name, &python_functions(&name[..1], 2));
    }
    repo.commit("dev@example.com", "initial layout", &["u.py", "v.py", "w.py", "x.py"]);
    // u and v always move together; w and x drift alone
    for i in 0..8 {
        repo.commit("dev@example.com", &format!("update pair {i}"), &["u.py", "v.py"]);
    }
    for i in 0..5 {
        repo.commit("dev@example.com", &format!("tweak w {i}"), &["w.py"]);
        repo.commit("dev@example.com", &format!("tweak x {i}"), &["x.py"]);
    }

    let outcome = run(&repo);
    let coupled = findings_of_kind(&outcome.snapshot.findings, FindingKind::HiddenCoupling);
    assert_eq!(coupled.len(), 1, "expected exactly one hidden coupling pair");
    assert_eq!(coupled[0].entities, vec!["u.py".to_string(), "v.py".to_string()]);

    // Evidence: lift above 2 with no structural edge
    let lift_evidence =
        coupled[0].evidence.iter().find(|e| e.signal == "cochange_pair_count").unwrap();
    assert!(lift_evidence.value > 2.0, "lift = {}", lift_evidence.value);
    assert!(coupled[0].evidence.iter().any(|e| e.note.contains("no structural edge")));

    // The cochange edge itself is symmetric and recorded in the snapshot
    let edge = outcome
        .snapshot
        .cochange_edges
        .iter()
        .find(|e| e.a == "u.py" && e.b == "v.py")
        .expect("cochange edge present");
    assert!(edge.lift >= 0.0);
    assert_eq!(edge.count, 9);
}

#[test]
fn backward_layer_violation() {
    let repo = TestRepo::new();
    repo.write("core/a.py", "from api import b\n\ndef base():\n    return b.handle()\n");
    repo.write("core/util.py", "def support():\n    return 1\n");
    repo.write("mid/m1.py", "from core import a\n\ndef step():\n    return a.base()\n");
    repo.write("mid/m2.py", "from core import util\n\ndef other():\n    return util.support()\n");
    repo.write("api/b.py", "from mid import m1\n\ndef handle():\n    return m1.step()\n");
    repo.write("api/c.py", "from mid import m2\n\ndef serve():\n    return m2.other()\n");

    let outcome = run(&repo);

    let backward: Vec<_> = outcome
        .snapshot
        .violations
        .iter()
        .filter(|v| v.kind == shannon_insight::ViolationKind::Backward)
        .collect();
    assert!(
        backward.iter().any(|v| v.src_module == "core" && v.tgt_module == "api"),
        "expected a BACKWARD violation core -> api, got {:?}",
        outcome.snapshot.violations
    );

    let layer_findings =
        findings_of_kind(&outcome.snapshot.findings, FindingKind::LayerViolation);
    assert!(layer_findings
        .iter()
        .any(|f| f.entities.contains(&"core".to_string()) && f.entities.contains(&"api".to_string())));
}

#[test]
fn hub_with_single_author_is_silo_and_blindspot() {
    let mut repo = TestRepo::new();
    repo.git_init();
    repo.write("hub.py", &python_functions("hub", 4));
    let mut leaves = Vec::new();
    for i in 0..15 {
        let name = format!("leaf{i}.py");
        repo.write(&name, &format!("import hub\n\ndef use_{i}():\n    return hub.hub_0({i})\n"));
        leaves.push(name);
    }
    let leaf_refs: Vec<&str> = leaves.iter().map(String::as_str).collect();
    repo.commit("solo@example.com", "initial", &[&["hub.py"][..], &leaf_refs[..]].concat());
    // hub.py keeps changing, always the same author
    for i in 0..6 {
        repo.commit("solo@example.com", &format!("evolve hub {i}"), &["hub.py"]);
    }
    // other files get single touches so the change median stays low
    for name in &leaves[..6] {
        repo.commit("solo@example.com", "leaf touch", &[name]);
    }

    let outcome = run(&repo);
    assert_eq!(outcome.summary.tier, Some(Tier::Bayesian));

    let silos = findings_of_kind(&outcome.snapshot.findings, FindingKind::KnowledgeSilo);
    assert!(
        silos.iter().any(|f| f.entities.contains(&"hub.py".to_string())),
        "expected knowledge_silo on hub.py, findings: {:?}",
        outcome.snapshot.findings.iter().map(|f| (f.kind, &f.entities)).collect::<Vec<_>>()
    );

    let blindspots =
        findings_of_kind(&outcome.snapshot.findings, FindingKind::ReviewBlindspot);
    assert!(blindspots.iter().any(|f| f.entities.contains(&"hub.py".to_string())));

    // Bus factor evidence reads as one effective contributor
    let silo = silos.iter().find(|f| f.entities.contains(&"hub.py".to_string())).unwrap();
    let bus = silo.evidence.iter().find(|e| e.signal == "bus_factor").unwrap();
    assert!(bus.value < 1.5);
}

#[test]
fn chronic_finding_across_three_runs() {
    let repo = TestRepo::new();
    // A god file under the absolute-tier thresholds: long, many
    // functions, heavy control flow
    repo.write("x.py", &python_functions("busy", 100));
    repo.write("y.py", "import x\n\ndef use():\n    return x.busy_0(1)\n");

    for _ in 0..3 {
        let outcome = run(&repo);
        assert_eq!(outcome.summary.tier, Some(Tier::Absolute));
        assert!(
            !findings_of_kind(&outcome.snapshot.findings, FindingKind::GodFile).is_empty(),
            "god_file should fire in the absolute tier"
        );
    }

    let db = HistoryDb::open(repo.path()).unwrap();
    let chronic = db.chronic_findings(3).unwrap();
    let god = chronic.iter().find(|c| c.finding_type == "god_file").expect("chronic god_file");
    assert!(god.occurrence_count >= 3);
}

#[test]
fn tier_downgrade_on_tiny_repo() {
    let repo = TestRepo::new();
    for i in 0..8 {
        repo.write(&format!("f{i}.py"), &python_functions("fn", 2));
    }

    let outcome = run(&repo);
    assert_eq!(outcome.summary.tier, Some(Tier::Absolute));

    // No percentile fields anywhere
    for (path, map) in &outcome.snapshot.file_signals {
        for (name, entry) in map {
            assert!(
                entry.percentile.is_none(),
                "unexpected percentile on {}/{}",
                path,
                name
            );
        }
    }

    // Composites are absent from the snapshot
    for composite in ["codebase_health", "wiring_score", "architecture_health"] {
        assert!(
            !outcome.snapshot.global_signals.contains_key(composite),
            "{} should be skipped in the absolute tier",
            composite
        );
    }
    for map in outcome.snapshot.file_signals.values() {
        assert!(!map.contains_key("risk_score"));
        assert!(!map.contains_key("wiring_quality"));
    }
}

#[test]
fn single_file_codebase() {
    let repo = TestRepo::new();
    repo.write("only.py", "def solo():\n    return 42\n");

    let outcome = run(&repo);
    assert_eq!(outcome.summary.files_scanned, 1);
    assert_eq!(outcome.summary.tier, Some(Tier::Absolute));

    // Global signals exist, composites do not
    assert!(outcome.snapshot.global_signals.contains_key("total_files"));
    assert!(outcome.snapshot.codebase_health().is_none());

    // At most one finding (the orphan)
    assert!(outcome.snapshot.findings.len() <= 1);
}

#[test]
fn two_runs_are_idempotent() {
    let mut repo = TestRepo::new();
    repo.git_init();
    repo.write("a.py", "import b\n\ndef top():\n    return b.mid()\n");
    repo.write("b.py", "def mid():\n    return 3\n");
    repo.commit("dev@example.com", "initial", &["a.py", "b.py"]);
    repo.commit("dev@example.com", "fix: mid", &["b.py"]);

    let first = run(&repo);
    let second = run(&repo);

    assert_eq!(first.snapshot.file_signals, second.snapshot.file_signals);

    let keys = |findings: &[Finding]| {
        let mut keys: Vec<String> =
            findings.iter().map(|f| f.identity_key.clone()).collect();
        keys.sort();
        keys
    };
    assert_eq!(keys(&first.snapshot.findings), keys(&second.snapshot.findings));
}

#[test]
fn rename_preserves_identity_keys() {
    let repo = TestRepo::new();
    let body = python_functions("busy", 100);
    repo.write("x.py", &body);
    repo.write("y.py", "import x\n\ndef use():\n    return x.busy_0(1)\n");
    run(&repo);

    // OS-level rename, same content
    std::fs::rename(repo.path().join("x.py"), repo.path().join("renamed.py")).unwrap();
    repo.write("y.py", "import renamed\n\ndef use():\n    return renamed.busy_0(1)\n");
    run(&repo);

    let db = HistoryDb::open(repo.path()).unwrap();
    let chronic = db.chronic_findings(2).unwrap();
    assert!(
        chronic.iter().any(|c| c.finding_type == "god_file"),
        "god_file lifecycle should survive the rename"
    );
}

#[test]
fn disconnected_graph_has_zero_fiedler() {
    let repo = TestRepo::new();
    repo.write("a.py", "import b\n\ndef f():\n    return b.g()\n");
    repo.write("b.py", "def g():\n    return 1\n");
    repo.write("c.py", "def lonely():\n    return 2\n");

    let outcome = run(&repo);
    let fiedler = outcome
        .snapshot
        .global_signals
        .get("fiedler_value")
        .and_then(|e| e.value.as_f64())
        .unwrap();
    assert_eq!(fiedler, 0.0);
}

#[test]
fn empty_history_defaults() {
    let repo = TestRepo::new();
    repo.write("a.py", "def f():\n    return 1\n");
    repo.write("b.py", "import a\n\ndef g():\n    return a.f()\n");

    let outcome = run(&repo);
    // Temporal slot is populated-but-empty; churn defaults recorded
    let a = &outcome.snapshot.file_signals["a.py"];
    assert_eq!(a.get("total_changes").and_then(|e| e.value.as_f64()), Some(0.0));
    assert_eq!(
        a.get("churn_trajectory").and_then(|e| e.value.as_label().map(str::to_string)),
        Some("DORMANT".to_string())
    );
    // Temporal finders skipped quietly, run completes
    assert!(outcome.summary.analyzers_skipped.is_empty());
}
