use std::collections::HashSet;

use once_cell::sync::Lazy;

/// Words excluded from term extraction: articles, pronouns, auxiliary and
/// common verbs, prepositions, conjunctions, quantifiers, filler adverbs,
/// and contraction fragments.
static STOPWORDS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        // Articles
        "a", "an", "the",
        // Pronouns
        "i", "me", "my", "myself", "you", "your", "yours", "yourself", "he", "him", "his",
        "himself", "she", "her", "hers", "herself", "it", "its", "itself", "we", "us", "our",
        "ours", "ourselves", "they", "them", "their", "theirs", "themselves", "this", "that",
        "these", "those", "what", "which", "who", "whom",
        // Be / have / do
        "am", "is", "are", "was", "were", "be", "been", "being", "have", "has", "had", "having",
        "do", "does", "did", "doing", "done",
        // Modals
        "will", "would", "shall", "should", "can", "could", "may", "might", "must",
        // Common verbs
        "get", "got", "getting", "go", "goes", "going", "went", "gone", "make", "made", "making",
        "take", "took", "taken", "taking", "come", "came", "coming", "see", "saw", "seen",
        "seeing", "know", "knew", "known", "knowing", "think", "thought", "thinking", "want",
        "wanted", "wanting", "need", "needed", "needing", "try", "tried", "trying", "use",
        "used", "using", "find", "found", "finding", "give", "gave", "given", "giving", "tell",
        "told", "telling", "say", "said", "saying", "let", "lets", "letting", "put", "puts",
        "putting", "keep", "kept", "keeping", "start", "started", "starting", "seem", "seemed",
        "seeming", "help", "helped", "helping", "show", "showed", "shown", "showing", "feel",
        "felt", "feeling", "look", "looked", "looking",
        // Prepositions
        "to", "of", "in", "for", "on", "with", "at", "by", "from", "up", "about", "into",
        "over", "after", "before", "between", "under", "again", "out", "off", "down",
        "through", "during", "without", "around", "among", "along", "across",
        // Conjunctions
        "and", "but", "or", "nor", "so", "yet", "both", "either", "neither", "not", "only",
        "also", "just", "than", "then", "when", "where", "why", "how", "if", "because",
        "while", "although", "though", "unless", "until", "whether",
        // Determiners and quantifiers
        "all", "each", "every", "any", "some", "no", "none", "few", "many", "much", "more",
        "most", "less", "least", "other", "another", "such", "same",
        // Adverbs
        "very", "really", "quite", "too", "always", "never", "often", "sometimes", "usually",
        "already", "still", "even", "now", "here", "there", "today", "tomorrow", "yesterday",
        "well", "back", "way",
        // Other common words
        "yes", "ok", "okay", "like", "thing", "things", "time", "day", "days", "week", "weeks",
        "year", "years", "month", "months", "people", "person", "man", "woman", "first",
        "last", "next", "new", "old", "good", "great", "bad", "little", "big", "long",
        "right", "left", "own", "part", "lot", "something", "nothing", "everything",
        "anything", "someone", "anyone", "everyone", "maybe", "probably", "actually",
        "basically",
        // Contraction fragments and stray letters
        "s", "t", "m", "d", "ll", "ve", "re",
    ]
    .into_iter()
    .collect()
});

pub fn is_stopword(word: &str) -> bool {
    STOPWORDS.contains(word)
}
