use std::io::Write;

use goldenfile::Mint;

fn pretty_print_test(source: &str, goldenfile: &str) {
    let mut mint = Mint::new("tests/goldenfiles/parsing");
    let mut goldenfile = mint.new_goldenfile(goldenfile).unwrap();

    let program = pclc::parse(source).unwrap();
    let mut out = Vec::new();
    program.pretty_print(&mut out).unwrap();
    goldenfile.write_all(&out).unwrap();
}

#[test]
fn hello() {
    pretty_print_test(include_str!("testfiles/hello.pcl"), "hello.golden");
}

#[test]
fn sum() {
    pretty_print_test(include_str!("testfiles/sum.pcl"), "sum.golden");
}
