use chrono::NaiveDate;
use kn_core::NewsItem;

pub const SYSTEM: &str = "\
あなたは小学校低学年（6〜8歳）向けのニュース記事を書く編集者です。
- 1〜3年生が読める やさしい言葉と 短い文を使う
- 難しい漢字には ふりがなを つける
- 難しい考え方は 身近な例で せつめいする
- 正確さを たもったまま わかりやすくする
- 記事は Markdown で書く";

pub const DRAFT: &str = "\
上記のニュースから1つを選んで、小学校低学年（1〜3年生）向けの記事を作成してください。

次の点に注意してください：
1. 簡単な言葉と短い文を使う
2. 難しい漢字にはふりがなをつける
3. 明確な見出しと短い段落を使う
4. 教育的な要素を含める
5. 子どもが興味を持つように書く

記事はマークダウン形式で作成し、以下の構成にしてください：
- キャッチーなタイトル（# タイトル）
- ニュースの概要を説明する導入部
- 3〜4つのセクション（## 見出し）
- 難しい概念の簡単な説明
- 簡単なまとめ

記事の本文だけを出力してください。";

pub const CRITIQUE: &str = "\
この記事の内容は小学校低学年向けに適切ですか？文章の難易度、使われている言葉、構成などが対象年齢に合っているか確認してください。

1行目には必ず次のどちらかだけを書いてください：
VERDICT: APPROVE
VERDICT: REVISE
2行目以降に、具体的な改善点を書いてください。";

pub const REVISE: &str = "\
指摘された改善点に基づいて、記事を修正してください。小学校低学年の子どもが理解できるように、さらに平易な言葉と表現を使ってください。
修正した記事の本文だけを、同じマークダウン構成で出力してください。";

/// Yes/no appropriateness question for one news item.
pub fn screening(item: &NewsItem) -> String {
    format!(
        "評価してください: この以下の記事は小学生低学年（6〜8歳）に適切ですか？
記事のタイトル: {}
記事の概要: {}
記事の内容: {}

以下の基準で評価してください:
1. 暴力的な内容が含まれていないか
2. 政治的に議論を呼ぶ内容が含まれていないか
3. 性的な内容が含まれていないか
4. 子供が理解できる内容か
5. 教育的価値があるか

'YES'または'NO'で答えてください。その後に短い理由を書いてください。",
        item.title, item.description, item.content
    )
}

/// The collected news as the opening message of the conversation.
pub fn news_digest(date: NaiveDate, news: &[NewsItem]) -> String {
    let mut digest = format!(
        "今日（{}）の日本の小学生向けニュースです。\n",
        date.format("%Y年%m月%d日")
    );
    for (i, item) in news.iter().enumerate() {
        digest.push_str(&format!(
            "\n【ニュース{}】\nタイトル: {}\n概要: {}\n内容: {}\n出典: {}\n",
            i + 1,
            item.title,
            item.description,
            item.content,
            item.source
        ));
    }
    digest
}
