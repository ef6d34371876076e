//! Optional human-facing reporting, gated by `HeapConfig`'s print flags. None
//! of this feeds back into the builder — it only reads the finished state.

use colored::Colorize;

use crate::config::HeapConfig;
use crate::heap::NativeImageHeap;
use crate::partition::PartitionKind;

/// Prints object-count/size histogram for each partition, one line per
/// partition kind, when `config.print_heap_histogram` is set.
pub fn print_heap_histogram(config: &HeapConfig, heap: &NativeImageHeap) {
    if !config.print_heap_histogram {
        return;
    }
    println!("{}", "Heap object histogram".bold());
    for kind in PartitionKind::all() {
        let partition = heap.partition(kind);
        println!(
            "  {:<20} {:>8} objects  {:>10} bytes",
            kind.name().bright_black(),
            partition.count,
            partition.size
        );
    }
}

/// Prints the read-only/writable byte totals when
/// `config.print_partition_sizes` is set.
pub fn print_partition_sizes(config: &HeapConfig, heap: &NativeImageHeap) {
    if !config.print_partition_sizes {
        return;
    }
    println!(
        "{} {} bytes read-only, {} bytes writable",
        "Partition sizes:".bold(),
        heap.get_readonly_size().to_string().green(),
        heap.get_writable_size().to_string().yellow(),
    );
}

/// Prints a debug message when `verbose > 2`, matching the CLI's own
/// severity threshold.
macro_rules! debug {
    ($verbose:expr, $msg:literal) => {
        if $verbose > 2 {
            println!("{}{}", "D : ".bold().bright_black(), $msg.bright_black());
        }
    };
    ($verbose:expr, $argmsg:literal, $($arg:tt)*) => {
        if $verbose > 2 {
            println!("{}{}", "D : ".bold().bright_black(), format!($argmsg, $($arg)*).bright_black());
        }
    };
}

/// Prints a fatal error message, unconditionally.
macro_rules! error {
    ($msg:literal, $($arg:tt)*) => {
        println!("{}{}", "E : ".bold().red(), format!($msg, $($arg)*).red());
    };
}

pub use debug;
pub use error;
