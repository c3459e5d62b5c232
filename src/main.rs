use std::error::Error;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use log::info;
use prettytable::{Cell, Row, Table};

use heapdb::database::parse_types;
use heapdb::{DEFAULT_POOL_PAGES, Database, DbIterator, SeqScan, TransactionId, TupleDesc, Type};

#[derive(Parser)]
#[command(name = "heapdb", version, about = "Heap file storage engine tools")]
struct Cli {
    /// Number of pages held by the buffer pool
    #[arg(long, default_value_t = DEFAULT_POOL_PAGES)]
    pool_pages: usize,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Encode a delimited text file as a heap file
    Convert {
        input: PathBuf,
        output: PathBuf,
        /// Column types, e.g. int,string,int
        #[arg(long)]
        types: String,
        #[arg(long, default_value_t = ',')]
        delimiter: char,
    },
    /// Print every tuple of a heap file
    Print {
        file: PathBuf,
        #[arg(long)]
        types: String,
    },
}

fn table_name(path: &Path) -> String {
    path.file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| "table".to_string())
}

fn column_desc(types: Vec<Type>) -> TupleDesc {
    let names = (0..types.len()).map(|i| format!("c{}", i)).collect();
    TupleDesc::new(types, names)
}

fn convert(
    pool_pages: usize,
    input: &Path,
    output: &Path,
    types: &str,
    delimiter: char,
) -> Result<(), Box<dyn Error>> {
    let desc = column_desc(parse_types(types)?);
    let delimiter = u8::try_from(delimiter).map_err(|_| {
        io::Error::new(io::ErrorKind::InvalidInput, "delimiter must be a single byte")
    })?;
    if output.exists() {
        fs::remove_file(output)?;
    }

    let db = Database::new(pool_pages);
    let table = db
        .catalog()
        .add_table(&table_name(output), output, desc, None)?;
    let rows = db.load_csv(table, input, delimiter)?;
    let pages = db.catalog().resolve(table)?.file().num_pages()?;
    info!("Converted {} into {}", input.display(), output.display());
    println!("Wrote {} rows in {} pages to {}", rows, pages, output.display());
    Ok(())
}

fn print(pool_pages: usize, file: &Path, types: &str) -> Result<(), Box<dyn Error>> {
    if !file.is_file() {
        return Err(Box::new(io::Error::new(
            io::ErrorKind::NotFound,
            format!("{} does not exist", file.display()),
        )));
    }

    let db = Database::new(pool_pages);
    let name = table_name(file);
    let table = db
        .catalog()
        .add_table(&name, file, column_desc(parse_types(types)?), None)?;

    let mut scan = SeqScan::new(&db, TransactionId::new(), table, &name)?;
    let mut out = Table::new();
    let titles = (0..scan.schema().num_fields())
        .map(|i| Cell::new(scan.schema().field_name(i).ok().flatten().unwrap_or("")))
        .collect();
    out.set_titles(Row::new(titles));

    scan.open()?;
    let mut count = 0;
    while scan.has_next()? {
        let tuple = scan.next()?;
        out.add_row(Row::new(
            tuple
                .fields()
                .iter()
                .map(|field| Cell::new(&field.to_string()))
                .collect(),
        ));
        count += 1;
    }
    scan.close();

    out.printstd();
    println!("{} rows", count);
    Ok(())
}

fn main() {
    env_logger::init();
    let cli = Cli::parse();

    let result = match &cli.command {
        Command::Convert {
            input,
            output,
            types,
            delimiter,
        } => convert(cli.pool_pages, input, output, types, *delimiter),
        Command::Print { file, types } => print(cli.pool_pages, file, types),
    };

    if let Err(err) = result {
        eprintln!("Error: {}", err);
        std::process::exit(1);
    }
}
