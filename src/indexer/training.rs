use crate::indexer::Adapter;
use crate::indexer::log_line::LogLine;
use crate::model::{ElementId, ElementKind, Key};
use crate::stats::Bag;
use crate::store::Graph;
use crate::warnings::{Warning, WarningKind};
use anyhow::{Context, Result, bail};

const SOURCE: &str = "Training log";

/// Reads the `-Xlog:aot*` output of a training run: which constant pool entries were
/// archived or reverted, which classes were skipped, and the cache configuration.
#[derive(Debug, Default)]
pub struct TrainingLogAdapter;

impl TrainingLogAdapter {
    pub fn new() -> Self {
        Self
    }
}

impl Adapter for TrainingLogAdapter {
    fn source(&self) -> &'static str {
        SOURCE
    }

    fn accept_line(&mut self, graph: &mut Graph, content: &str) -> Result<()> {
        let line = LogLine::parse(content);
        if !line.contains_tags(&["aot"]) {
            return Ok(());
        }
        let message = line.trimmed_message;

        if line.contains_tags(&["resolve"]) && line.is_level("trace") {
            if message.starts_with("archived") {
                archived(graph, message)?;
            } else if message.starts_with("reverted") {
                reverted(graph, message)?;
            }
        }

        if message.starts_with("Skipping ") {
            skipping(graph, message)
        } else if line.is_level("warning") {
            warning(graph, message);
            Ok(())
        } else if line.is_level("error") {
            graph.warnings.push(Warning::unknown(message));
            Ok(())
        } else if line.is_level("info") {
            info(graph, message)
        } else {
            Ok(())
        }
    }
}

/// Whitespace-separated words after the `CP entry [N]:` prefix.
fn entry_words(message: &str) -> Result<Vec<&str>> {
    let start = message
        .find("]: ")
        .with_context(|| format!("no CP entry marker in {message}"))?;
    Ok(message[start + 2..].split_whitespace().collect())
}

fn word<'a>(words: &[&'a str], n: usize) -> Result<&'a str> {
    words
        .get(n)
        .copied()
        .with_context(|| format!("missing word {n} in CP entry"))
}

/// `java/util/List.size` -> (`java/util/List`, `size`).
fn owner_and_member(name: &str) -> Result<(&str, &str)> {
    match name.rfind('.') {
        Some(dot) => Ok((&name[..dot], &name[dot + 1..])),
        None => bail!("no member in {name}"),
    }
}

/// `owner.member:descriptor` -> (`owner.member`, `descriptor`).
fn split_descriptor(name: &str) -> Result<(&str, &str)> {
    name.split_once(':')
        .with_context(|| format!("no descriptor in {name}"))
}

fn find_symbol(graph: &mut Graph, name: &str) -> ElementId {
    let symbol = graph.get_or_create(name, ElementKind::Symbol, None);
    graph.add_source(symbol, SOURCE);
    symbol
}

/// Links the symbol to the class it names, creating the class when the
/// name looks like a qualified class name.
fn assign_class_to_symbol(graph: &mut Graph, symbol: ElementId) -> ElementId {
    let class_name = graph[symbol].key().replace('/', ".");
    let class = if let Some(class) = graph.find(&class_name, ElementKind::Class) {
        Some(class)
    } else if let Some(inner) = class_name
        .strip_prefix('L')
        .and_then(|s| s.strip_suffix(';'))
        .filter(|_| !class_name.contains('('))
    {
        Some(graph.get_or_create(inner, ElementKind::Class, None))
    } else if class_name.contains('.') && !class_name.contains('(') {
        Some(graph.get_or_create(&class_name, ElementKind::Class, None))
    } else {
        None
    };
    if let Some(class) = class {
        graph.link_symbol(class, symbol);
        graph.add_source(class, SOURCE);
    }
    symbol
}

fn link_to_parent(
    graph: &mut Graph,
    parent: ElementId,
    origin: &str,
    name: &str,
    message: &str,
) -> ElementId {
    let symbol = find_symbol(graph, name);
    let dotted = name.replace('/', ".");
    let class = graph.find(&dotted, ElementKind::Class).or_else(|| {
        dotted
            .strip_prefix('L')
            .and_then(|s| s.strip_suffix(';'))
            .and_then(|inner| graph.find(inner, ElementKind::Class))
    });
    if let Some(class) = class {
        graph.link_symbol(class, symbol);
        let referenced_by = format!("Referenced by {}.", graph[symbol].key());
        graph.add_origin(class, referenced_by);
    }
    graph.add_origin(symbol, origin);
    graph.add_source(symbol, message);
    graph.add_reference(parent, symbol);
    symbol
}

// archived klass  CP entry [  2]: org/infinispan/rest/framework/impl/InvocationImpl unreg => java/lang/Object boot
// archived field  CP entry [ 20]: org/infinispan/rest/framework/impl/InvocationImpl => org/infinispan/rest/framework/impl/InvocationImpl.action:Ljava/lang/String;
// archived interface method CP entry [ 13]: jdk/jfr/internal/jfc/model/XmlNot java/util/List.size:()I => java/util/List
// archived indy   CP entry [294]: jdk/jfr/internal/dcmd/DCmdDump (0) => java/lang/invoke/LambdaMetafactory.metafactory:(...)Ljava/lang/invoke/CallSite;
fn archived(graph: &mut Graph, message: &str) -> Result<()> {
    let words = entry_words(message)?;
    let parent = find_symbol(graph, word(&words, 0)?);
    graph.add_source(parent, message);
    assign_class_to_symbol(graph, parent);

    if message.starts_with("archived klass") {
        let origin = format!("Used by {} {}.", graph[parent].key(), word(&words, 4)?);
        link_to_parent(graph, parent, &origin, word(&words, 3)?, message);
    } else if message.starts_with("archived field") {
        let (member, descriptor) = split_descriptor(word(&words, 2)?)?;
        let (owner, field) = owner_and_member(member)?;
        let origin = format!("Used by a field in {member}.");
        for name in [descriptor, owner, field] {
            link_to_parent(graph, parent, &origin, name, message);
        }
    } else if message.starts_with("archived method") || message.starts_with("archived interface method") {
        let target = word(&words, 3)?;
        let (member, descriptor) = split_descriptor(word(&words, 1)?)?;
        let (owner, method) = owner_and_member(member)?;
        let origin = format!("Used by method {member}.");
        for name in [owner, method, descriptor, target] {
            link_to_parent(graph, parent, &origin, name, message);
        }
    } else if message.starts_with("archived indy ") {
        let (member, descriptor) = split_descriptor(word(&words, 3)?)?;
        let (owner, method) = owner_and_member(member)?;
        let origin = format!("Used by indy {}.", word(&words, 0)?);
        for name in [owner, method, descriptor] {
            link_to_parent(graph, parent, &origin, name, message);
        }
    }
    Ok(())
}

// reverted klass  CP entry [102]: io/reactivex/rxjava3/internal/subscribers/InnerQueuedSubscriber unreg => io/reactivex/rxjava3/internal/util/QueueDrainHelper
// reverted method CP entry [ 16]: io/reactivex/rxjava3/internal/jdk8/FlowableStageSubscriber java/util/concurrent/CompletableFuture.complete:(Ljava/lang/Object;)Z
fn reverted(graph: &mut Graph, message: &str) -> Result<()> {
    let words = entry_words(message)?;
    let parent = find_symbol(graph, word(&words, 0)?);
    assign_class_to_symbol(graph, parent);

    let (kind, origin, names): (WarningKind, String, Vec<&str>) =
        if message.starts_with("reverted klass") {
            (
                WarningKind::CacheCreationRevertedKlass,
                format!("Used by {}.", graph[parent].key()),
                vec![word(&words, 3)?],
            )
        } else if message.starts_with("reverted field") {
            let (member, descriptor) = split_descriptor(word(&words, 2)?)?;
            let (owner, field) = owner_and_member(member)?;
            (
                WarningKind::CacheCreationRevertedField,
                format!("Used by a field in {member}."),
                vec![descriptor, owner, field],
            )
        } else if message.starts_with("reverted method")
            || message.starts_with("reverted interface method")
        {
            let (member, descriptor) = split_descriptor(word(&words, 1)?)?;
            let (owner, method) = owner_and_member(member)?;
            (
                WarningKind::CacheCreationRevertedMethod,
                format!("Used by method {member}."),
                vec![descriptor, owner, method],
            )
        } else if message.starts_with("reverted indy ") {
            let (member, descriptor) = split_descriptor(word(&words, 3)?)?;
            let (owner, method) = owner_and_member(member)?;
            (
                WarningKind::CacheCreationRevertedIndy,
                format!("Used by indy {}.", word(&words, 0)?),
                vec![owner, method, descriptor],
            )
        } else {
            return Ok(());
        };

    let mut affected: Vec<Key> = vec![graph[parent].full_key()];
    for name in names {
        let symbol = find_symbol(graph, name);
        assign_class_to_symbol(graph, symbol);
        link_to_parent(graph, parent, &origin, name, message);
        let key = graph[symbol].full_key();
        if !affected.contains(&key) {
            affected.push(key);
        }
    }
    graph.warnings.push(Warning::new(kind, affected, message));
    Ok(())
}

// Skipping org/apache/logging/log4j/core/async/AsyncLoggerContext: Failed verification
fn skipping(graph: &mut Graph, message: &str) -> Result<()> {
    let name = message
        .split_whitespace()
        .nth(1)
        .context("Skipping line without a class")?;
    let class_name = name.replace('/', ".").replace(':', "");
    class_warning(graph, class_name.trim(), message);
    Ok(())
}

fn class_warning(graph: &mut Graph, class_name: &str, message: &str) {
    let class = graph.get_or_create(class_name, ElementKind::Class, None);
    graph.add_source(class, SOURCE);
    let key = graph[class].full_key();
    graph
        .warnings
        .push(Warning::new(WarningKind::CacheCreation, vec![key], message));
}

fn warning(graph: &mut Graph, message: &str) {
    if let Some(rest) = message.strip_prefix("Preload Warning: Verification failed for ") {
        let class_name = rest.split(' ').next().unwrap_or(rest);
        class_warning(graph, class_name, message);
    } else {
        graph.warnings.push(Warning::unknown(message));
    }
}

/// `key<sep> value` into the bag, splitting at the first separator.
fn store_split(bag: &mut Bag, message: &str, separator: &str, keep_separator: bool) {
    if let Some(idx) = message.find(separator) {
        let value = if keep_separator {
            &message[idx..]
        } else {
            &message[idx + separator.len()..]
        };
        bag.add(&message[..idx], value.trim());
    }
}

fn info(graph: &mut Graph, message: &str) -> Result<()> {
    if let Some(alignment) = message.strip_prefix("Core region alignment:") {
        // Core region alignment: 4096
        graph.configuration.add("Core region alignment", alignment.trim());
    } else if message.starts_with("The AOT configuration file was created with ") {
        // The AOT configuration file was created with UseCompressedOops = 1, UseCompressedClassPointers = 1
        let words: Vec<&str> = message.split(' ').collect();
        for i in 8..words.len().saturating_sub(1) {
            if words[i] == "=" {
                graph
                    .configuration
                    .add(words[i - 1], words[i + 1].replace(',', ""));
            }
        }
    } else if let Some(mode) = message.strip_prefix("ArchiveRelocationMode:") {
        graph.configuration.add("ArchiveRelocationMode", mode.trim());
    } else if message.starts_with("Reserved") && message.contains("bytes") {
        // Reserved output buffer space at 0x00007f5702e00000 [1084227584 bytes]
        // Reserved class_space_rs   [0x000000005c000000 - 0x000000009c000000] (1073741824) bytes
        if message.contains("at 0x") {
            store_split(&mut graph.allocation, message, " at ", false);
        } else {
            store_split(&mut graph.allocation, message, "[", true);
        }
    } else if message.starts_with("Mapped static") {
        // Mapped static  region #0 at base 0x0000000057001000 top 0x0000000058fbe000 (ReadWrite)
        if let (Some(key_end), Some(value_start)) = (message.find("at base"), message.find("0x")) {
            graph
                .allocation
                .add(&message[..key_end], &message[value_start..]);
        }
    } else if message.starts_with("archived module property")
        || (message.starts_with("initial ") && message.find(':').is_some_and(|i| i > 0))
        || message.starts_with("Using AOT-linked classes: ")
    {
        // initial full module graph: disabled
        store_split(&mut graph.configuration, message, ":", false);
    } else if let Some(class_name) = message.strip_prefix("JVM_StartThread() ignored:") {
        class_warning(graph, class_name.trim(), message);
    } else if message.starts_with("Heap range = ") || message.starts_with("heap range") {
        store_split(&mut graph.allocation, message, "=", false);
    } else if message.starts_with("string table array (single level) length") {
        store_split(&mut graph.statistics, message, "=", false);
    } else if message.starts_with("Archived") {
        // Archived 97 method handle intrinsics (26392 bytes)
        let mut words = message.split_whitespace().skip(1);
        let value = words.next().context("Archived line without a count")?;
        let key = words.collect::<Vec<_>>().join(" ");
        graph.statistics.add(&key, value);
    } else if message.starts_with("Shared file region (") {
        // Shared file region (rw) 0: 31818032 bytes, addr 0x0000000800001000 file offset 0x00001000 crc 0xc67c8575
        let words: Vec<&str> = message.split_whitespace().collect();
        let key = message.split(':').next().unwrap_or(message).trim();
        let (Some(size), Some(unit), Some(addr), Some(offset), Some(crc)) = (
            words.get(5),
            words.get(6),
            words.get(8),
            words.get(11),
            words.get(13),
        ) else {
            bail!("short shared file region line");
        };
        graph
            .configuration
            .add(&format!("{key} size"), format!("{size} {}", unit.replace(',', "")));
        graph.allocation.add(&format!("{key} addr"), *addr);
        graph.allocation.add(&format!("{key} file offset"), *offset);
        graph.configuration.add(&format!("{key} crc"), *crc);
    } else if message.starts_with("Number of classes") {
        // Number of classes 10857
        if let Some(space) = message.rfind(' ') {
            graph.statistics.add(&message[..space], &message[space + 1..]);
        }
    } else if message.find(" = ").is_some_and(|i| i > 0) {
        generic_statistics(&mut graph.statistics, message);
    }
    Ok(())
}

// instance classes   = 10170, aot-linked =  3059, inited =   422
// Method CP entries =  15059, archived =  14986 ( 99,5%), reverted =     73
fn generic_statistics(bag: &mut Bag, message: &str) {
    let mut first_key: Option<String> = None;
    for piece in message.split(',') {
        let Some(eq) = piece.find('=') else {
            continue;
        };
        if eq == 0 || piece.rfind('=') != Some(eq) {
            continue;
        }
        let name = piece[..eq].trim();
        let value = piece[eq + 1..].trim();
        match &first_key {
            Some(first) => bag.add(&format!("{first} {name}"), value),
            None => {
                first_key = Some(name.to_string());
                bag.add(name, value);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generic_statistics_prefix_follow_up_keys() {
        let mut bag = Bag::new();
        generic_statistics(
            &mut bag,
            "instance classes   = 10170, aot-linked =  3059, inited =   422",
        );
        assert_eq!(bag.get("instance classes"), Some("10170"));
        assert_eq!(bag.get("instance classes aot-linked"), Some("3059"));
        assert_eq!(bag.get("instance classes inited"), Some("422"));
    }

    #[test]
    fn entry_words_start_after_marker() {
        let words = entry_words(
            "archived klass  CP entry [  2]: org/acme/Impl unreg => java/lang/Object boot",
        )
        .expect("marker present");
        assert_eq!(words, vec!["org/acme/Impl", "unreg", "=>", "java/lang/Object", "boot"]);
    }
}
