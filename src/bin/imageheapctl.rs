use std::fs;
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use colored::Colorize;

use native_image_heap::config::HeapConfig;
use native_image_heap::diagnostics::{debug, error, print_heap_histogram, print_partition_sizes};
use native_image_heap::error::Error;
use native_image_heap::heap::NativeImageHeap;
use native_image_heap::host::{obj, HostValue, Instance};
use native_image_heap::metadata::{
    FieldInfo, FieldLocation, ImageType, LayoutConstants, StaticFieldsInfo, StorageKind,
    TestMetadata, TypeId, TypeKind,
};
use native_image_heap::relocatable_buffer::RelocatableBuffer;

/// Developer harness for the native image heap builder
#[derive(Parser)]
#[command(version = "0.1.0")]
#[command(name = "imageheapctl")]
#[command(about, long_about)]
#[command(arg_required_else_help = true)]
struct Cli {
    /// Verbosity level for logging/debugging
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Build a small demonstration heap and print its partition summary
    Demo {
        /// Optional HeapConfig JSON file; defaults are used otherwise
        #[arg(long, value_name = "CONFIG")]
        config: Option<PathBuf>,
    },
}

fn load_config(cli: &Cli, path: &Option<PathBuf>) -> Result<HeapConfig, Error> {
    match path {
        None => Ok(HeapConfig::default()),
        Some(path) => {
            debug!(cli.verbose, "Reading config: {:#?}", path.display());
            let contents = fs::read_to_string(path)?;
            serde_json::from_str(&contents)
                .map_err(|e| Error::InvalidState(format!("invalid config: {e}")))
        }
    }
}

/// A small demonstration class table: one instance class with a single
/// reference field pointing at an interned string, and the two string-array
/// static-fields placeholders every heap needs.
fn demo_metadata() -> (TestMetadata, TypeId, TypeId, TypeId) {
    let mut metadata = TestMetadata::default();
    metadata.layout = LayoutConstants::default();

    let string_class = TypeId(1);
    let node_class = TypeId(2);
    let hub_class = TypeId(3);
    let long_array_class = TypeId(4);
    let object_array_class = TypeId(5);

    // Every DynamicHub shares one runtime class for layout purposes.
    metadata.register(ImageType {
        id: hub_class,
        name: "com.example.DynamicHub".into(),
        instantiated: true,
        kind: TypeKind::Instance {
            fields: vec![],
            monitor_field_offset: 0,
            hybrid: None,
            instance_size: 16,
        },
        hub: obj(HostValue::DynamicHub {
            represents: hub_class,
            hub_class,
            identity_hash: 0,
            from_class: false,
        }),
        hash_code_offset: 8,
    });

    let string_hub = obj(HostValue::DynamicHub {
        represents: string_class,
        hub_class,
        identity_hash: 0,
        from_class: false,
    });
    metadata.register(ImageType {
        id: string_class,
        name: "java.lang.String".into(),
        instantiated: true,
        kind: TypeKind::Array { component_kind: StorageKind::Char },
        hub: string_hub,
        hash_code_offset: 0,
    });

    let node_hub = obj(HostValue::DynamicHub {
        represents: node_class,
        hub_class,
        identity_hash: 0,
        from_class: false,
    });
    metadata.register(ImageType {
        id: node_class,
        name: "demo.Node".into(),
        instantiated: true,
        kind: TypeKind::Instance {
            fields: vec![FieldInfo {
                name: "label".into(),
                storage_kind: StorageKind::Reference,
                is_accessed: true,
                is_written: true,
                is_final: false,
                location: FieldLocation::InstanceOffset(16),
            }],
            monitor_field_offset: 0,
            hybrid: None,
            instance_size: 24,
        },
        hub: node_hub,
        hash_code_offset: 8,
    });

    let long_array_hub = obj(HostValue::DynamicHub {
        represents: long_array_class,
        hub_class,
        identity_hash: 0,
        from_class: false,
    });
    metadata.register(ImageType {
        id: long_array_class,
        name: "long[]".into(),
        instantiated: true,
        kind: TypeKind::Array { component_kind: StorageKind::Long },
        hub: long_array_hub,
        hash_code_offset: 0,
    });

    let object_array_hub = obj(HostValue::DynamicHub {
        represents: object_array_class,
        hub_class,
        identity_hash: 0,
        from_class: false,
    });
    metadata.register(ImageType {
        id: object_array_class,
        name: "java.lang.Object[]".into(),
        instantiated: true,
        kind: TypeKind::Array { component_kind: StorageKind::Reference },
        hub: object_array_hub,
        hash_code_offset: 0,
    });

    metadata.statics = Some(StaticFieldsInfo {
        primitive_array: obj(HostValue::LongArray(long_array_class, std::rc::Rc::from(&[0i64; 4][..]), 0)),
        reference_array: obj(HostValue::ObjectArray(object_array_class, vec![None; 4], 0)),
    });

    (metadata, string_class, node_class, hub_class)
}

fn run_demo(cli: &Cli, config: HeapConfig) -> Result<(), Error> {
    let (metadata, string_class, node_class, _hub_class) = demo_metadata();
    let mut heap = NativeImageHeap::new(config.clone(), Box::new(metadata), string_class)?;

    let label = obj(HostValue::String {
        class: string_class,
        content: std::rc::Rc::from("demo-node"),
        identity_hash: 7,
        host_interned: true,
    });
    let node = obj(HostValue::Instance(Instance {
        class: node_class,
        fields: vec![Some(label)],
        identity_hash: 11,
        monitor_word_set: false,
    }));

    heap.add_initial_objects(vec![(node, "demo-root".into())])?;
    heap.add_trailing_objects()?;

    let mut ro_buf = RelocatableBuffer::with_capacity(256);
    let mut rw_buf = RelocatableBuffer::with_capacity(256);
    heap.write_heap(&mut ro_buf, &mut rw_buf)?;

    debug!(
        cli.verbose,
        "wrote {} read-only bytes, {} writable bytes",
        ro_buf.data().len(),
        rw_buf.data().len()
    );
    print_heap_histogram(&config, &heap);
    print_partition_sizes(&config, &heap);
    Ok(())
}

fn main() -> Result<(), Error> {
    let cli = Cli::parse();

    match &cli.command {
        None => {}
        Some(Commands::Demo { config }) => {
            let heap_config = load_config(&cli, config)?;
            if let Err(e) = run_demo(&cli, heap_config) {
                error!("demo build failed: {}", e);
                return Err(e);
            }
        }
    }

    Ok(())
}
