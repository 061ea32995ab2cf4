mod common;
use common::run_pipeline;

#[test]
#[should_panic]
fn fail_lexing() {
    run_pipeline(include_str!("fails/fail_lexing.pcl"));
}

#[test]
#[should_panic]
fn fail_parsing() {
    run_pipeline(include_str!("fails/fail_parsing.pcl"));
}

#[test]
#[should_panic]
fn arrays_cannot_be_assigned() {
    run_pipeline(include_str!("fails/assign_arrays.pcl"));
}

#[test]
#[should_panic]
fn second_body_after_forward_body() {
    run_pipeline(include_str!("fails/second_body.pcl"));
}

#[test]
#[should_panic]
fn goto_to_undeclared_label() {
    run_pipeline(include_str!("fails/goto_undeclared.pcl"));
}

/// The failing phase matters, not just the failure
mod phases {
    #[test]
    fn assigning_arrays_is_a_semantic_error() {
        let ast = pclc::parse(include_str!("fails/assign_arrays.pcl")).unwrap();
        assert!(pclc::analyze(ast).is_err());
    }

    #[test]
    fn second_body_is_a_semantic_error() {
        let ast = pclc::parse(include_str!("fails/second_body.pcl")).unwrap();
        assert!(pclc::analyze(ast).is_err());
    }

    #[test]
    fn undeclared_goto_is_a_semantic_error() {
        let ast = pclc::parse(include_str!("fails/goto_undeclared.pcl")).unwrap();
        assert!(pclc::analyze(ast).is_err());
    }
}
