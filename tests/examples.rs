mod common;
use common::run_pipeline;

#[test]
fn hello() {
    run_pipeline(include_str!("testfiles/hello.pcl"));
}

#[test]
fn sum() {
    run_pipeline(include_str!("testfiles/sum.pcl"));
}

#[test]
fn fact() {
    run_pipeline(include_str!("testfiles/fact.pcl"));
}

#[test]
fn pointers() {
    run_pipeline(include_str!("testfiles/pointers.pcl"));
}

#[test]
fn labels() {
    run_pipeline(include_str!("testfiles/labels.pcl"));
}

#[test]
fn nested() {
    run_pipeline(include_str!("testfiles/nested.pcl"));
}

#[test]
fn siblings() {
    run_pipeline(include_str!("testfiles/siblings.pcl"));
}

#[test]
fn deep() {
    run_pipeline(include_str!("testfiles/deep.pcl"));
}

#[test]
fn tour() {
    run_pipeline(include_str!("testfiles/tour.pcl"));
}
