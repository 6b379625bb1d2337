use shadeparse::pos::SourceLocator;
use shadeparse::sexp::display_sexp;
use testfiles::{test_files, InputFile, OutputFile};

#[test_files(rs = "tests/parser.rs", dir = "tests/parse")]
#[test]
fn parse_snapshot(
    #[suffix = ".sksl"] input: InputFile,
    #[suffix = ".sexp.txt"] output_sexp: OutputFile,
    #[suffix = ".errors.txt"] output_errors: OutputFile,
) {
    let source = input.read_bytes();
    let source_locator = SourceLocator::new(&source);
    let (ast, errors) = shadeparse::parse(&source);
    output_sexp.compare(&display_sexp(&ast));
    if errors.is_empty() {
        output_errors.remove();
    } else {
        let errors_txt = errors
            .iter()
            .map(|e| {
                let start = source_locator.position(&source, e.range().0);
                let end = source_locator.position(&source, e.range().1);
                format!(
                    "{}:{}-{}:{}: {}\n",
                    start.line + 1,
                    start.column + 1,
                    end.line + 1,
                    end.column + 1,
                    e
                )
            })
            .collect::<String>();
        output_errors.compare(&errors_txt);
    }
}
