use ensembl_gene_names::error::AnnotateError;

fn main() {
    if let Err(err) = ensembl_gene_names::run() {
        match err.downcast_ref::<AnnotateError>() {
            Some(failure) => eprintln!("error: {failure}"),
            None => eprintln!("error: {err:#}"),
        }
        std::process::exit(1);
    }
}
